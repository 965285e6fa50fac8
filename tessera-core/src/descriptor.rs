//! Descriptor structures for tables and databases.
//!
//! Descriptors are the persisted, versioned metadata records of the catalog.
//! A table descriptor additionally owns the ordered queue of pending
//! structural mutations; the truncation classifier reads a snapshot copy of
//! that queue, never a shared reference.

use crate::enums::{ConstraintKind, ConstraintValidity};
use crate::identity::{
    ColumnId, DescriptorId, DescriptorVersion, IndexId, StorageGeneration, Timestamp,
};
use crate::mutation::{Mutation, MutationElement};
use crate::privilege::PrivilegeDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// TABLE ELEMENTS
// ============================================================================

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub name: String,
    /// SQL type name, e.g. `INT8` or the name of a user-defined type.
    pub type_name: String,
    pub nullable: bool,
    pub default_expr: Option<String>,
    /// Catalog objects this column's definition depends on, e.g. the type
    /// descriptor of a user-defined enumerated type. Sequence relationships
    /// are tracked separately below and are not dependencies in this sense.
    pub depends_on: Vec<DescriptorId>,
    /// Sequences consumed by this column's default expression.
    pub uses_sequences: Vec<DescriptorId>,
    /// Sequences owned by this column; dropped together with it.
    pub owns_sequences: Vec<DescriptorId>,
}

impl ColumnDescriptor {
    /// A plain column with no cross-object relationships.
    pub fn plain(id: ColumnId, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
            default_expr: None,
            depends_on: Vec::new(),
            uses_sequences: Vec::new(),
            owns_sequences: Vec::new(),
        }
    }

    /// Whether dropping this column requires observing another catalog
    /// object's pre-drop state. Owned sequences are dropped along with the
    /// column and do not count; neither does a sequence-backed default.
    pub fn has_cross_object_dependency(&self) -> bool {
        !self.depends_on.is_empty()
    }
}

/// A secondary or primary index of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub id: IndexId,
    pub name: String,
    pub column_ids: Vec<ColumnId>,
    pub unique: bool,
}

/// A table constraint, possibly mid-validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDescriptor {
    pub name: String,
    pub kind: ConstraintKind,
    pub validity: ConstraintValidity,
    /// For foreign keys: the referenced table, which may be the constraint's
    /// own table (self-referencing FK).
    pub referenced_table: Option<DescriptorId>,
    /// For check constraints: the check expression source.
    pub expr: Option<String>,
}

/// A reverse dependency edge: another catalog object reads this table,
/// possibly through specific columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub id: DescriptorId,
    pub column_ids: Vec<ColumnId>,
}

// ============================================================================
// TABLE DESCRIPTOR
// ============================================================================

/// Versioned metadata record for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub id: DescriptorId,
    pub name: String,
    pub version: DescriptorVersion,
    /// Commit time of the version currently stored, set by the store.
    pub modification_time: Timestamp,
    pub parent_database: DescriptorId,
    pub privileges: PrivilegeDescriptor,
    /// Physical storage identity; replaced wholesale by truncation.
    pub storage_generation: StorageGeneration,
    pub primary_index: IndexDescriptor,
    pub indexes: Vec<IndexDescriptor>,
    pub columns: Vec<ColumnDescriptor>,
    pub constraints: Vec<ConstraintDescriptor>,
    /// Ordered queue of pending structural changes; order reflects commit
    /// order and is stable for a given snapshot.
    pub mutations: Vec<Mutation>,
    pub depended_on_by: Vec<DependencyRef>,
    pub next_index_id: IndexId,
    pub next_column_id: ColumnId,
}

impl TableDescriptor {
    pub fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn find_index(&self, name: &str) -> Option<&IndexDescriptor> {
        if self.primary_index.name == name {
            return Some(&self.primary_index);
        }
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn find_mutation_for_job(&self, job_id: crate::identity::JobId) -> Option<&Mutation> {
        self.mutations.iter().find(|m| m.job_id == job_id)
    }

    /// Allocate the next index id, advancing the counter.
    pub fn allocate_index_id(&mut self) -> IndexId {
        let id = self.next_index_id;
        self.next_index_id = id.next();
        id
    }

    /// Allocate the next column id, advancing the counter.
    pub fn allocate_column_id(&mut self) -> ColumnId {
        let id = self.next_column_id;
        self.next_column_id = id.next();
        id
    }

    /// Append a mutation to the queue, preserving commit order.
    pub fn enqueue_mutation(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Owned snapshot of the mutation queue for the classifier.
    pub fn mutation_queue(&self) -> Vec<Mutation> {
        self.mutations.clone()
    }

    /// All column ids currently live on the table, including columns still
    /// being added through the mutation queue.
    pub fn live_column_ids(&self) -> Vec<ColumnId> {
        let mut ids: Vec<ColumnId> = self.columns.iter().map(|c| c.id).collect();
        for m in &self.mutations {
            if let MutationElement::Column(col) = &m.element {
                ids.push(col.id);
            }
        }
        ids
    }
}

// ============================================================================
// DATABASE DESCRIPTOR
// ============================================================================

/// An entry in a database's child schema map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub id: DescriptorId,
    pub dropped: bool,
}

/// Versioned metadata record for a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseDescriptor {
    pub id: DescriptorId,
    pub name: String,
    pub version: DescriptorVersion,
    /// Commit time of the version currently stored, set by the store.
    pub modification_time: Timestamp,
    pub privileges: PrivilegeDescriptor,
    /// Child schemas by name. A `BTreeMap` keeps the encoded form
    /// deterministic.
    pub schemas: BTreeMap<String, SchemaInfo>,
}

impl DatabaseDescriptor {
    pub fn find_schema(&self, name: &str) -> Option<&SchemaInfo> {
        self.schemas.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::JobId;

    fn table() -> TableDescriptor {
        TableDescriptor {
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
            depended_on_by: Vec::new(),
            next_index_id: IndexId(2),
            next_column_id: ColumnId(2),
        }
    }

    #[test]
    fn test_id_allocation_advances() {
        let mut t = table();
        assert_eq!(t.allocate_index_id(), IndexId(2));
        assert_eq!(t.allocate_index_id(), IndexId(3));
        assert_eq!(t.allocate_column_id(), ColumnId(2));
        assert_eq!(t.next_column_id, ColumnId(3));
    }

    #[test]
    fn test_mutation_queue_snapshot_is_owned() {
        let mut t = table();
        let col = ColumnDescriptor::plain(ColumnId(2), "j", "INT8");
        t.enqueue_mutation(Mutation::add_column(col, JobId(7)));
        let snapshot = t.mutation_queue();
        t.mutations.clear();
        // The snapshot is unaffected by later descriptor changes.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name(), "j");
    }

    #[test]
    fn test_find_index_covers_primary() {
        let t = table();
        assert!(t.find_index("primary").is_some());
        assert!(t.find_index("idx").is_none());
    }

    #[test]
    fn test_live_column_ids_include_adding_columns() {
        let mut t = table();
        let col = ColumnDescriptor::plain(ColumnId(2), "j", "INT8");
        t.enqueue_mutation(Mutation::add_column(col, JobId(7)));
        assert_eq!(t.live_column_ids(), vec![ColumnId(1), ColumnId(2)]);
    }
}
