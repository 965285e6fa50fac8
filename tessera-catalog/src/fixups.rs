//! Post-deserialization fixups.
//!
//! Each fixup is idempotent: applying it to already-fixed state changes
//! nothing and reports `false`. The builder runs the full pass on every
//! decode and uses the combined flag to decide whether the caller should
//! persist a rewrite.

use tessera_core::{
    DatabaseDescriptor, PrivilegeDescriptor, PrivilegeGrant, PrivilegeSet, TableDescriptor,
    ADMIN_ROLE, ROOT_USER,
};

/// Normalize persisted privilege records in place.
///
/// Restores full privileges for the owner and the `admin`/`root` roles,
/// merges duplicate grantee entries, drops empty grants, and sorts the
/// grant list by grantee name. Returns whether anything changed.
pub fn fix_privileges(privs: &mut PrivilegeDescriptor) -> bool {
    let before = privs.clone();

    // Merge duplicate grantees, OR-ing their bits together.
    let mut merged: Vec<PrivilegeGrant> = Vec::with_capacity(privs.grants.len());
    for grant in privs.grants.drain(..) {
        match merged.iter_mut().find(|g| g.grantee == grant.grantee) {
            Some(existing) => {
                existing.privileges |= grant.privileges;
                existing.grant_option |= grant.grant_option;
            }
            None => merged.push(grant),
        }
    }
    privs.grants = merged;

    // The owner and the system roles always hold every privilege.
    for grantee in [privs.owner.clone(), ADMIN_ROLE.into(), ROOT_USER.into()] {
        match privs.grants.iter_mut().find(|g| g.grantee == grantee) {
            Some(grant) => grant.privileges = PrivilegeSet::full(),
            None => privs.grants.push(PrivilegeGrant {
                grantee,
                privileges: PrivilegeSet::full(),
                grant_option: PrivilegeSet::empty(),
            }),
        }
    }

    // Grants that carry no privileges at all are dead records.
    privs
        .grants
        .retain(|g| !g.privileges.is_empty() || !g.grant_option.is_empty());

    privs.grants.sort_by(|a, b| a.grantee.cmp(&b.grantee));

    *privs != before
}

/// Remove a dangling self-entry from a database's child schema map.
///
/// A schema entry whose id equals the database's own id is a remnant left
/// behind by a prior drop and must not survive a rebuild.
pub fn remove_dropped_self_entry(db: &mut DatabaseDescriptor) -> bool {
    let before = db.schemas.len();
    let own_id = db.id;
    db.schemas.retain(|_, info| info.id != own_id);
    db.schemas.len() != before
}

/// Remove dangling self-references from a table's reverse-dependency list.
///
/// A `depended_on_by` edge pointing at the table itself with no surviving
/// column is a remnant left behind by a prior drop.
pub fn prune_dangling_self_references(table: &mut TableDescriptor) -> bool {
    let own_id = table.id;
    let live = table.live_column_ids();
    let before = table.depended_on_by.len();
    table
        .depended_on_by
        .retain(|r| r.id != own_id || r.column_ids.iter().any(|c| live.contains(c)));
    table.depended_on_by.len() != before
}

/// Clamp element id counters so they stay ahead of every allocated id.
pub fn fix_element_id_counters(table: &mut TableDescriptor) -> bool {
    let mut changed = false;
    let max_index = table
        .indexes
        .iter()
        .map(|i| i.id)
        .chain(std::iter::once(table.primary_index.id))
        .max()
        .unwrap_or(table.primary_index.id);
    if table.next_index_id <= max_index {
        table.next_index_id = max_index.next();
        changed = true;
    }
    let max_column = table.columns.iter().map(|c| c.id).max();
    if let Some(max_column) = max_column {
        if table.next_column_id <= max_column {
            table.next_column_id = max_column.next();
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{ColumnId, DependencyRef, DescriptorId, SchemaInfo};

    fn privileges_with_duplicates() -> PrivilegeDescriptor {
        PrivilegeDescriptor {
            owner: "app".to_string(),
            grants: vec![
                PrivilegeGrant {
                    grantee: "reader".to_string(),
                    privileges: PrivilegeSet::SELECT,
                    grant_option: PrivilegeSet::empty(),
                },
                PrivilegeGrant {
                    grantee: "reader".to_string(),
                    privileges: PrivilegeSet::INSERT,
                    grant_option: PrivilegeSet::empty(),
                },
                PrivilegeGrant {
                    grantee: "stale".to_string(),
                    privileges: PrivilegeSet::empty(),
                    grant_option: PrivilegeSet::empty(),
                },
            ],
            version: 1,
        }
    }

    #[test]
    fn test_fix_privileges_merges_and_restores_owner() {
        let mut privs = privileges_with_duplicates();
        assert!(fix_privileges(&mut privs));

        let reader = privs.find_grant("reader").unwrap();
        assert_eq!(
            reader.privileges,
            PrivilegeSet::SELECT | PrivilegeSet::INSERT
        );
        assert_eq!(
            privs.find_grant("app").unwrap().privileges,
            PrivilegeSet::full()
        );
        assert!(privs.find_grant("stale").is_none());
    }

    #[test]
    fn test_fix_privileges_is_idempotent() {
        let mut privs = privileges_with_duplicates();
        assert!(fix_privileges(&mut privs));
        let fixed = privs.clone();
        assert!(!fix_privileges(&mut privs));
        assert_eq!(privs, fixed);
    }

    #[test]
    fn test_remove_dropped_self_entry() {
        let mut db = DatabaseDescriptor {
            id: DescriptorId(50),
            name: "db".to_string(),
            version: tessera_core::DescriptorVersion::INITIAL,
            modification_time: chrono::Utc::now(),
            privileges: PrivilegeDescriptor::base("root"),
            schemas: Default::default(),
        };
        db.schemas.insert(
            "public".to_string(),
            SchemaInfo {
                id: DescriptorId(51),
                dropped: false,
            },
        );
        db.schemas.insert(
            "db".to_string(),
            SchemaInfo {
                id: DescriptorId(50),
                dropped: true,
            },
        );
        assert!(remove_dropped_self_entry(&mut db));
        assert!(db.find_schema("public").is_some());
        assert!(db.find_schema("db").is_none());
        assert!(!remove_dropped_self_entry(&mut db));
    }

    #[test]
    fn test_fix_privileges_keeps_owner_when_owner_is_root() {
        let mut privs = PrivilegeDescriptor {
            owner: ROOT_USER.to_string(),
            grants: Vec::new(),
            version: 1,
        };
        assert!(fix_privileges(&mut privs));
        assert_eq!(
            privs.grants.iter().filter(|g| g.grantee == ROOT_USER).count(),
            1
        );
    }

    #[test]
    fn test_prune_dangling_self_reference() {
        use tessera_core::{
            ColumnDescriptor, DescriptorVersion, IndexDescriptor, IndexId, StorageGeneration,
        };
        let mut table = TableDescriptor {
            id: DescriptorId(52),
            name: "t".to_string(),
            version: DescriptorVersion::INITIAL,
            modification_time: chrono::Utc::now(),
            parent_database: DescriptorId(50),
            privileges: PrivilegeDescriptor::base("root"),
            storage_generation: StorageGeneration::new(),
            primary_index: IndexDescriptor {
                id: IndexId(1),
                name: "primary".to_string(),
                column_ids: vec![ColumnId(1)],
                unique: true,
            },
            indexes: Vec::new(),
            columns: vec![ColumnDescriptor::plain(ColumnId(1), "i", "INT8")],
            constraints: Vec::new(),
            mutations: Vec::new(),
            depended_on_by: vec![
                // Dangling: self-edge through a column that no longer exists.
                DependencyRef {
                    id: DescriptorId(52),
                    column_ids: vec![ColumnId(9)],
                },
                // Live: another object reads column 1.
                DependencyRef {
                    id: DescriptorId(60),
                    column_ids: vec![ColumnId(1)],
                },
            ],
            next_index_id: IndexId(2),
            next_column_id: ColumnId(2),
        };
        assert!(prune_dangling_self_references(&mut table));
        assert_eq!(table.depended_on_by.len(), 1);
        assert_eq!(table.depended_on_by[0].id, DescriptorId(60));
        assert!(!prune_dangling_self_references(&mut table));
    }
}
