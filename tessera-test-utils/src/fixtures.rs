//! Descriptor and mutation fixtures.
//!
//! Mutation enqueue helpers mirror what the statement planner commits
//! before a job is spawned: DROP moves the element out of the public
//! lists and into the queue, ADD queues a not-yet-public element.

use std::sync::atomic::{AtomicU32, Ordering};
use tessera_catalog::{CatalogStore, TableDescriptorBuilder};
use tessera_core::{
    ColumnDescriptor, ColumnId, ConstraintDescriptor, ConstraintKind, ConstraintValidity,
    DescriptorId, DescriptorVersion, IndexDescriptor, IndexId, JobId, Mutation,
    PrivilegeDescriptor, StorageGeneration, TableDescriptor,
};

static NEXT_DESCRIPTOR_ID: AtomicU32 = AtomicU32::new(100);

/// Allocate a test-unique descriptor id.
pub fn next_descriptor_id() -> DescriptorId {
    DescriptorId(NEXT_DESCRIPTOR_ID.fetch_add(1, Ordering::Relaxed))
}

/// Create and commit a table with the given columns; the first column is
/// the primary key. Returns the new descriptor id.
pub async fn create_table(
    catalog: &dyn CatalogStore,
    name: &str,
    columns: &[&str],
) -> DescriptorId {
    let id = next_descriptor_id();
    let columns: Vec<ColumnDescriptor> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| ColumnDescriptor::plain(ColumnId(i as u32 + 1), *col, "INT8"))
        .collect();
    let next_column_id = ColumnId(columns.len() as u32 + 1);
    let desc = TableDescriptor {
        id,
        name: name.to_string(),
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
        columns,
        constraints: Vec::new(),
        mutations: Vec::new(),
        depended_on_by: Vec::new(),
        next_index_id: IndexId(2),
        next_column_id,
    };
    let created = TableDescriptorBuilder::new(&desc).build_created_mutable();
    catalog
        .commit_table(created)
        .await
        .expect("fixture table commit failed");
    id
}

async fn enqueue(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    make: impl FnOnce(&mut TableDescriptor) -> Mutation,
) {
    let _intent = catalog.write_intent(table).await;
    let mut mutable = catalog
        .read_table_for_write(table)
        .await
        .expect("fixture table missing");
    let mutation = make(mutable.descriptor_mut());
    mutable.descriptor_mut().enqueue_mutation(mutation);
    catalog
        .commit_table(mutable)
        .await
        .expect("fixture mutation commit failed");
}

/// Queue a plain ADD COLUMN mutation.
pub async fn enqueue_add_column(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    name: &str,
    job_id: JobId,
) {
    let name = name.to_string();
    enqueue(catalog, table, move |desc| {
        let id = desc.allocate_column_id();
        Mutation::add_column(ColumnDescriptor::plain(id, name, "INT8"), job_id)
    })
    .await;
}

/// Queue an ADD INDEX mutation over the named columns; returns the new
/// index id.
pub async fn enqueue_add_index(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    name: &str,
    columns: &[&str],
    job_id: JobId,
) -> IndexId {
    let _intent = catalog.write_intent(table).await;
    let mut mutable = catalog
        .read_table_for_write(table)
        .await
        .expect("fixture table missing");
    let desc = mutable.descriptor_mut();
    let column_ids: Vec<ColumnId> = columns
        .iter()
        .filter_map(|c| desc.find_column(c).map(|col| col.id))
        .collect();
    let id = desc.allocate_index_id();
    let index = IndexDescriptor {
        id,
        name: name.to_string(),
        column_ids,
        unique: false,
    };
    desc.enqueue_mutation(Mutation::add_index(index, job_id));
    catalog
        .commit_table(mutable)
        .await
        .expect("fixture mutation commit failed");
    id
}

/// Queue a DROP INDEX mutation, moving the index out of the public list.
/// A missing index is fabricated so rejection scenarios need no setup.
pub async fn enqueue_drop_index(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    name: &str,
    job_id: JobId,
) -> IndexId {
    let _intent = catalog.write_intent(table).await;
    let mut mutable = catalog
        .read_table_for_write(table)
        .await
        .expect("fixture table missing");
    let desc = mutable.descriptor_mut();
    let index = match desc.indexes.iter().position(|i| i.name == name) {
        Some(pos) => desc.indexes.remove(pos),
        None => IndexDescriptor {
            id: desc.allocate_index_id(),
            name: name.to_string(),
            column_ids: Vec::new(),
            unique: false,
        },
    };
    let dropped = index.id;
    desc.enqueue_mutation(Mutation::drop_index(index, job_id));
    catalog
        .commit_table(mutable)
        .await
        .expect("fixture mutation commit failed");
    dropped
}

/// Queue a plain DROP COLUMN mutation, moving the column out of the
/// public list.
pub async fn enqueue_drop_column(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    name: &str,
    job_id: JobId,
) {
    enqueue_drop_column_with(catalog, table, name, job_id, |_| {}).await;
}

/// DROP COLUMN where the column's definition depends on another catalog
/// object (e.g. a user-defined type).
pub async fn enqueue_drop_column_with_dependency(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    name: &str,
    depends_on: DescriptorId,
    job_id: JobId,
) {
    enqueue_drop_column_with(catalog, table, name, job_id, move |col| {
        col.type_name = "typ".to_string();
        col.depends_on.push(depends_on);
    })
    .await;
}

/// DROP COLUMN where the column's default reads a sequence.
pub async fn enqueue_drop_column_using_sequence(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    name: &str,
    sequence: DescriptorId,
    job_id: JobId,
) {
    enqueue_drop_column_with(catalog, table, name, job_id, move |col| {
        col.default_expr = Some("nextval('s')".to_string());
        col.uses_sequences.push(sequence);
    })
    .await;
}

/// DROP COLUMN where the column owns a sequence dropped along with it.
pub async fn enqueue_drop_column_owning_sequence(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    name: &str,
    sequence: DescriptorId,
    job_id: JobId,
) {
    enqueue_drop_column_with(catalog, table, name, job_id, move |col| {
        col.owns_sequences.push(sequence);
    })
    .await;
}

async fn enqueue_drop_column_with(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    name: &str,
    job_id: JobId,
    adjust: impl FnOnce(&mut ColumnDescriptor),
) {
    let name = name.to_string();
    enqueue(catalog, table, move |desc| {
        let mut column = match desc.columns.iter().position(|c| c.name == name) {
            Some(pos) => desc.columns.remove(pos),
            None => {
                let id = desc.allocate_column_id();
                ColumnDescriptor::plain(id, name, "INT8")
            }
        };
        adjust(&mut column);
        Mutation::drop_column(column, job_id)
    })
    .await;
}

/// Queue a CHECK constraint addition mid-validation.
pub async fn enqueue_add_check_constraint(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    name: &str,
    expr: &str,
    job_id: JobId,
) {
    let constraint = ConstraintDescriptor {
        name: name.to_string(),
        kind: ConstraintKind::Check,
        validity: ConstraintValidity::Unvalidated,
        referenced_table: None,
        expr: Some(expr.to_string()),
    };
    enqueue(catalog, table, move |_| {
        Mutation::add_constraint(constraint, job_id)
    })
    .await;
}

/// Queue a FOREIGN KEY constraint addition referencing `referenced`,
/// which may be the table itself.
pub async fn enqueue_add_fk_constraint(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    name: &str,
    referenced: DescriptorId,
    job_id: JobId,
) {
    let constraint = ConstraintDescriptor {
        name: name.to_string(),
        kind: ConstraintKind::ForeignKey,
        validity: ConstraintValidity::Unvalidated,
        referenced_table: Some(referenced),
        expr: None,
    };
    enqueue(catalog, table, move |_| {
        Mutation::add_constraint(constraint, job_id)
    })
    .await;
}

/// Queue a primary-key change.
pub async fn enqueue_pk_change(
    catalog: &dyn CatalogStore,
    table: DescriptorId,
    job_id: JobId,
) {
    let constraint = ConstraintDescriptor {
        name: "primary".to_string(),
        kind: ConstraintKind::PrimaryKey,
        validity: ConstraintValidity::Unvalidated,
        referenced_table: None,
        expr: None,
    };
    enqueue(catalog, table, move |_| {
        Mutation::add_constraint(constraint, job_id)
    })
    .await;
}
