//! Descriptor builders.
//!
//! A builder decodes raw descriptor state into typed Immutable/Mutable
//! views. Construction always clones caller-supplied data; the original
//! input is never mutated. The build pipeline is: clone, run the
//! post-deserialization fixup pass, optionally run an ordered list of
//! migration functions, then build the requested view.

use crate::encoding::{decode_database, decode_table};
use crate::fixups;
use std::ops::Deref;
use tessera_core::{
    CatalogResult, DatabaseDescriptor, DescriptorId, DescriptorType, DescriptorVersion,
    MigrationError, PrivilegeDescriptor, TableDescriptor,
};

/// An ordered migration step applied to a table descriptor during a build.
/// Returns whether it changed anything; an error aborts the build and is
/// surfaced unchanged.
pub type TableMigrationFn = fn(&mut TableDescriptor) -> Result<bool, MigrationError>;

/// Migration step for database descriptors.
pub type DatabaseMigrationFn = fn(&mut DatabaseDescriptor) -> Result<bool, MigrationError>;

// ============================================================================
// IMMUTABLE / MUTABLE VIEWS
// ============================================================================

/// Read-only snapshot of a table descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ImmutableTable {
    desc: TableDescriptor,
}

impl ImmutableTable {
    pub fn descriptor(&self) -> &TableDescriptor {
        &self.desc
    }

    pub fn into_descriptor(self) -> TableDescriptor {
        self.desc
    }
}

impl Deref for ImmutableTable {
    type Target = TableDescriptor;

    fn deref(&self) -> &TableDescriptor {
        &self.desc
    }
}

/// A table descriptor carrying pending in-memory changes.
///
/// `cluster_version` is the last-read persisted state, captured before any
/// fixup ran; it never changes after construction. Descriptors built with
/// [`TableDescriptorBuilder::build_created_mutable`] have no baseline.
#[derive(Debug, Clone)]
pub struct MutableTable {
    desc: TableDescriptor,
    cluster_version: Option<ImmutableTable>,
    changed: bool,
}

impl MutableTable {
    pub fn descriptor(&self) -> &TableDescriptor {
        &self.desc
    }

    pub fn descriptor_mut(&mut self) -> &mut TableDescriptor {
        &mut self.desc
    }

    pub fn into_descriptor(self) -> TableDescriptor {
        self.desc
    }

    /// The persisted state this mutable was built from, pre-fixup.
    pub fn cluster_version(&self) -> Option<&ImmutableTable> {
        self.cluster_version.as_ref()
    }

    /// Whether the fixup/migration passes altered semantic content. Drives
    /// whether the caller persists a rewrite even without logical changes.
    pub fn post_deserialization_changed(&self) -> bool {
        self.changed
    }
}

impl Deref for MutableTable {
    type Target = TableDescriptor;

    fn deref(&self) -> &TableDescriptor {
        &self.desc
    }
}

// ============================================================================
// TABLE BUILDER
// ============================================================================

/// Builder for table descriptors.
pub struct TableDescriptorBuilder {
    original: TableDescriptor,
    maybe_modified: Option<TableDescriptor>,
    changed: bool,
}

impl TableDescriptorBuilder {
    /// Start a build from an in-memory descriptor. The input is cloned,
    /// never aliased.
    pub fn new(desc: &TableDescriptor) -> Self {
        Self {
            original: desc.clone(),
            maybe_modified: None,
            changed: false,
        }
    }

    /// Start a build from persisted bytes. Malformed input is a fatal
    /// corruption-class error.
    pub fn from_bytes(bytes: &[u8]) -> CatalogResult<Self> {
        Ok(Self::new(&decode_table(bytes)?))
    }

    pub fn descriptor_type(&self) -> DescriptorType {
        DescriptorType::Table
    }

    /// Run the idempotent post-deserialization fixup pass on a fresh clone
    /// of the original.
    pub fn run_post_deserialization_changes(&mut self) {
        let mut work = self.original.clone();
        let privs_changed = fixups::fix_privileges(&mut work.privileges);
        let refs_pruned = fixups::prune_dangling_self_references(&mut work);
        let counters_fixed = fixups::fix_element_id_counters(&mut work);
        self.changed = privs_changed || refs_pruned || counters_fixed;
        self.maybe_modified = Some(work);
    }

    /// Apply an ordered list of migration functions. A failing migration
    /// aborts the build and surfaces its error unchanged.
    pub fn run_migration_changes(
        &mut self,
        migrations: &[TableMigrationFn],
    ) -> Result<(), MigrationError> {
        let original = &self.original;
        let work = self
            .maybe_modified
            .get_or_insert_with(|| original.clone());
        for migration in migrations {
            if migration(work)? {
                self.changed = true;
            }
        }
        Ok(())
    }

    /// Immutable view: the fixed-up state when fixups ran, else the
    /// original.
    pub fn build_immutable(&self) -> ImmutableTable {
        ImmutableTable {
            desc: self
                .maybe_modified
                .clone()
                .unwrap_or_else(|| self.original.clone()),
        }
    }

    /// Mutable view for a descriptor that already exists in the catalog.
    pub fn build_existing_mutable(&mut self) -> MutableTable {
        let original = &self.original;
        let desc = self
            .maybe_modified
            .get_or_insert_with(|| original.clone())
            .clone();
        MutableTable {
            desc,
            cluster_version: Some(ImmutableTable {
                desc: self.original.clone(),
            }),
            changed: self.changed,
        }
    }

    /// Mutable view for a descriptor that has never been persisted.
    pub fn build_created_mutable(&self) -> MutableTable {
        MutableTable {
            desc: self
                .maybe_modified
                .clone()
                .unwrap_or_else(|| self.original.clone()),
            cluster_version: None,
            changed: self.changed,
        }
    }
}

// ============================================================================
// DATABASE VIEWS & BUILDER
// ============================================================================

/// Read-only snapshot of a database descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ImmutableDatabase {
    desc: DatabaseDescriptor,
}

impl ImmutableDatabase {
    pub fn descriptor(&self) -> &DatabaseDescriptor {
        &self.desc
    }
}

impl Deref for ImmutableDatabase {
    type Target = DatabaseDescriptor;

    fn deref(&self) -> &DatabaseDescriptor {
        &self.desc
    }
}

/// A database descriptor carrying pending in-memory changes.
#[derive(Debug, Clone)]
pub struct MutableDatabase {
    desc: DatabaseDescriptor,
    cluster_version: Option<ImmutableDatabase>,
    changed: bool,
}

impl MutableDatabase {
    pub fn descriptor(&self) -> &DatabaseDescriptor {
        &self.desc
    }

    pub fn descriptor_mut(&mut self) -> &mut DatabaseDescriptor {
        &mut self.desc
    }

    pub fn into_descriptor(self) -> DatabaseDescriptor {
        self.desc
    }

    pub fn cluster_version(&self) -> Option<&ImmutableDatabase> {
        self.cluster_version.as_ref()
    }

    pub fn post_deserialization_changed(&self) -> bool {
        self.changed
    }
}

impl Deref for MutableDatabase {
    type Target = DatabaseDescriptor;

    fn deref(&self) -> &DatabaseDescriptor {
        &self.desc
    }
}

/// Builder for database descriptors.
pub struct DatabaseDescriptorBuilder {
    original: DatabaseDescriptor,
    maybe_modified: Option<DatabaseDescriptor>,
    changed: bool,
}

impl DatabaseDescriptorBuilder {
    pub fn new(desc: &DatabaseDescriptor) -> Self {
        Self {
            original: desc.clone(),
            maybe_modified: None,
            changed: false,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> CatalogResult<Self> {
        Ok(Self::new(&decode_database(bytes)?))
    }

    pub fn descriptor_type(&self) -> DescriptorType {
        DescriptorType::Database
    }

    pub fn run_post_deserialization_changes(&mut self) {
        let mut work = self.original.clone();
        let privs_changed = fixups::fix_privileges(&mut work.privileges);
        let self_entry_removed = fixups::remove_dropped_self_entry(&mut work);
        self.changed = privs_changed || self_entry_removed;
        self.maybe_modified = Some(work);
    }

    pub fn run_migration_changes(
        &mut self,
        migrations: &[DatabaseMigrationFn],
    ) -> Result<(), MigrationError> {
        let original = &self.original;
        let work = self
            .maybe_modified
            .get_or_insert_with(|| original.clone());
        for migration in migrations {
            if migration(work)? {
                self.changed = true;
            }
        }
        Ok(())
    }

    pub fn build_immutable(&self) -> ImmutableDatabase {
        ImmutableDatabase {
            desc: self
                .maybe_modified
                .clone()
                .unwrap_or_else(|| self.original.clone()),
        }
    }

    pub fn build_existing_mutable(&mut self) -> MutableDatabase {
        let original = &self.original;
        let desc = self
            .maybe_modified
            .get_or_insert_with(|| original.clone())
            .clone();
        MutableDatabase {
            desc,
            cluster_version: Some(ImmutableDatabase {
                desc: self.original.clone(),
            }),
            changed: self.changed,
        }
    }

    pub fn build_created_mutable(&self) -> MutableDatabase {
        MutableDatabase {
            desc: self
                .maybe_modified
                .clone()
                .unwrap_or_else(|| self.original.clone()),
            cluster_version: None,
            changed: self.changed,
        }
    }
}

// ============================================================================
// INITIAL DESCRIPTORS
// ============================================================================

/// Construct a version-1 mutable database descriptor with default
/// privileges.
pub fn new_initial_database(
    id: DescriptorId,
    name: impl Into<String>,
    owner: impl Into<String>,
) -> MutableDatabase {
    let desc = DatabaseDescriptor {
        id,
        name: name.into(),
        version: DescriptorVersion::INITIAL,
        modification_time: chrono::Utc::now(),
        privileges: PrivilegeDescriptor::base(owner),
        schemas: Default::default(),
    };
    DatabaseDescriptorBuilder::new(&desc).build_created_mutable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{encode_database, encode_table};
    use tessera_core::{
        descriptor_fingerprint, ColumnDescriptor, ColumnId, DependencyRef, IndexDescriptor,
        IndexId, PrivilegeGrant, PrivilegeSet, SchemaInfo, StorageGeneration,
    };

    fn unfixed_table() -> TableDescriptor {
        TableDescriptor {
            id: DescriptorId(52),
            name: "t".to_string(),
            version: DescriptorVersion(3),
            modification_time: chrono::DateTime::UNIX_EPOCH,
            parent_database: DescriptorId(50),
            privileges: PrivilegeDescriptor {
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
                ],
                version: 1,
            },
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
            depended_on_by: vec![DependencyRef {
                id: DescriptorId(52),
                column_ids: vec![ColumnId(7)],
            }],
            next_index_id: IndexId(2),
            next_column_id: ColumnId(2),
        }
    }

    #[test]
    fn test_builder_never_mutates_input() {
        let input = unfixed_table();
        let snapshot = input.clone();
        let mut builder = TableDescriptorBuilder::new(&input);
        builder.run_post_deserialization_changes();
        let _ = builder.build_existing_mutable();
        assert_eq!(input, snapshot);
    }

    // Fixing up already-fixed state changes nothing and encodes identically.
    #[test]
    fn test_fixups_are_idempotent_on_reencode() {
        let mut builder = TableDescriptorBuilder::new(&unfixed_table());
        builder.run_post_deserialization_changes();
        let first = builder.build_existing_mutable();
        assert!(first.post_deserialization_changed());

        let first_bytes = encode_table(first.descriptor()).unwrap();
        let mut second_builder = TableDescriptorBuilder::from_bytes(&first_bytes).unwrap();
        second_builder.run_post_deserialization_changes();
        let second = second_builder.build_existing_mutable();
        assert!(!second.post_deserialization_changed());

        let second_bytes = encode_table(second.descriptor()).unwrap();
        assert_eq!(
            descriptor_fingerprint(&first_bytes),
            descriptor_fingerprint(&second_bytes)
        );
    }

    #[test]
    fn test_cluster_version_is_pre_fixup_clone() {
        let input = unfixed_table();
        let mut builder = TableDescriptorBuilder::new(&input);
        builder.run_post_deserialization_changes();
        let mutable = builder.build_existing_mutable();

        let baseline = mutable.cluster_version().unwrap();
        assert_eq!(baseline.descriptor(), &input);
        // The working copy differs from the baseline exactly because fixups
        // altered something.
        assert_ne!(mutable.descriptor(), baseline.descriptor());
    }

    #[test]
    fn test_immutable_equals_original_when_nothing_to_fix() {
        let mut builder = TableDescriptorBuilder::new(&unfixed_table());
        builder.run_post_deserialization_changes();
        let fixed = builder.build_immutable().into_descriptor();

        let mut clean_builder = TableDescriptorBuilder::new(&fixed);
        clean_builder.run_post_deserialization_changes();
        assert_eq!(clean_builder.build_immutable().descriptor(), &fixed);
        let mutable = clean_builder.build_existing_mutable();
        assert!(!mutable.post_deserialization_changed());
        assert_eq!(mutable.descriptor(), mutable.cluster_version().unwrap().descriptor());
    }

    #[test]
    fn test_failing_migration_aborts_build() {
        fn broken(_: &mut TableDescriptor) -> Result<bool, MigrationError> {
            Err(MigrationError {
                migration: "broken-step",
                reason: "induced failure".to_string(),
            })
        }
        fn renames(t: &mut TableDescriptor) -> Result<bool, MigrationError> {
            t.name = "renamed".to_string();
            Ok(true)
        }

        let mut builder = TableDescriptorBuilder::new(&unfixed_table());
        builder.run_post_deserialization_changes();
        let err = builder
            .run_migration_changes(&[renames as TableMigrationFn, broken as TableMigrationFn])
            .unwrap_err();
        assert_eq!(err.migration, "broken-step");
    }

    #[test]
    fn test_migration_changes_set_changed_flag() {
        fn renames(t: &mut TableDescriptor) -> Result<bool, MigrationError> {
            t.name = "renamed".to_string();
            Ok(true)
        }

        let fixed = {
            let mut b = TableDescriptorBuilder::new(&unfixed_table());
            b.run_post_deserialization_changes();
            b.build_immutable().into_descriptor()
        };
        let mut builder = TableDescriptorBuilder::new(&fixed);
        builder.run_post_deserialization_changes();
        builder
            .run_migration_changes(&[renames as TableMigrationFn])
            .unwrap();
        let mutable = builder.build_existing_mutable();
        assert!(mutable.post_deserialization_changed());
        assert_eq!(mutable.descriptor().name, "renamed");
        // Baseline still carries the pre-migration name.
        assert_eq!(mutable.cluster_version().unwrap().name, "t");
    }

    #[test]
    fn test_created_mutable_has_no_baseline() {
        let created = new_initial_database(DescriptorId(50), "defaultdb", "root");
        assert!(created.cluster_version().is_none());
        assert_eq!(created.version, DescriptorVersion::INITIAL);
        assert!(created.privileges.find_grant("root").is_some());
    }

    #[test]
    fn test_database_self_entry_removed_on_build() {
        let mut db = new_initial_database(DescriptorId(50), "db", "root").into_descriptor();
        db.schemas.insert(
            "db".to_string(),
            SchemaInfo {
                id: DescriptorId(50),
                dropped: true,
            },
        );
        let bytes = encode_database(&db).unwrap();
        let mut builder = DatabaseDescriptorBuilder::from_bytes(&bytes).unwrap();
        builder.run_post_deserialization_changes();
        let rebuilt = builder.build_immutable();
        assert!(rebuilt.find_schema("db").is_none());
    }
}
