//! Schema-change job execution tests.
//!
//! Relocated from an inline `mod tests` in `src/job.rs`: these tests use
//! `InMemoryRowStore` from `tessera-test-utils`, which depends back on this
//! crate. As inline unit tests the `cfg(test)` build of this crate and the
//! normal build test-utils links against are distinct units, so their
//! `BackfillStore` traits do not unify. Run as an integration test the crate
//! is a single normal dependency shared with test-utils, so the impl applies.

use std::sync::Arc;
use tessera_catalog::CatalogStore;
use tessera_core::ConstraintValidity;
use tessera_schemachange::{BackfillStore, JobRegistry, PassThroughHook, SchemaChangeConfig};
use tessera_test_utils::{fixtures, InMemoryRowStore};

fn registry(catalog: Arc<dyn CatalogStore>, rows: Arc<InMemoryRowStore>) -> JobRegistry {
    JobRegistry::new(
        catalog,
        rows,
        Arc::new(PassThroughHook),
        SchemaChangeConfig::development(),
    )
}

#[tokio::test]
async fn test_job_ids_are_unique_and_increasing() {
    let catalog = Arc::new(tessera_catalog::InMemoryCatalog::new());
    let rows = Arc::new(InMemoryRowStore::new());
    let registry = registry(catalog, rows);
    let a = registry.allocate_job_id();
    let b = registry.allocate_job_id();
    assert!(b > a);
}

#[tokio::test]
async fn test_add_column_job_promotes_column() {
    let catalog: Arc<tessera_catalog::InMemoryCatalog> =
        Arc::new(tessera_catalog::InMemoryCatalog::new());
    let rows = Arc::new(InMemoryRowStore::new());
    let table_id = fixtures::create_table(catalog.as_ref(), "t", &["i", "j"]).await;
    let registry = registry(Arc::clone(&catalog) as _, Arc::clone(&rows));

    let job_id = registry.allocate_job_id();
    fixtures::enqueue_add_column(catalog.as_ref(), table_id, "k", job_id).await;

    let before = catalog.read_table(table_id).await.unwrap().version;
    let handle = registry.spawn(table_id, job_id);
    handle.wait().await.unwrap();

    let table = catalog.read_table(table_id).await.unwrap();
    assert!(table.find_column("k").is_some());
    assert!(table.mutations.is_empty());
    assert!(table.version > before);
    assert_eq!(registry.metrics().snapshot().jobs_succeeded, 1);
}

#[tokio::test]
async fn test_add_index_job_backfills_current_rows() {
    let catalog: Arc<tessera_catalog::InMemoryCatalog> =
        Arc::new(tessera_catalog::InMemoryCatalog::new());
    let rows = Arc::new(InMemoryRowStore::new());
    let table_id = fixtures::create_table(catalog.as_ref(), "t", &["i", "j"]).await;
    let generation = catalog.read_table(table_id).await.unwrap().storage_generation;
    rows.seed_rows(generation, 100).await;
    let registry = registry(Arc::clone(&catalog) as _, Arc::clone(&rows));

    let job_id = registry.allocate_job_id();
    let index_id =
        fixtures::enqueue_add_index(catalog.as_ref(), table_id, "idx", &["j"], job_id).await;

    registry.spawn(table_id, job_id).wait().await.unwrap();

    let table = catalog.read_table(table_id).await.unwrap();
    assert!(table.find_index("idx").is_some());
    assert_eq!(rows.index_entries(generation, index_id).await, 100);
    assert_eq!(registry.metrics().snapshot().rows_backfilled, 100);
}

#[tokio::test]
async fn test_drop_index_job_removes_index() {
    let catalog: Arc<tessera_catalog::InMemoryCatalog> =
        Arc::new(tessera_catalog::InMemoryCatalog::new());
    let rows = Arc::new(InMemoryRowStore::new());
    let table_id = fixtures::create_table(catalog.as_ref(), "t", &["i", "j"]).await;
    let registry = registry(Arc::clone(&catalog) as _, Arc::clone(&rows));

    // Build the index first.
    let add_job = registry.allocate_job_id();
    fixtures::enqueue_add_index(catalog.as_ref(), table_id, "idx", &["j"], add_job).await;
    registry.spawn(table_id, add_job).wait().await.unwrap();

    let drop_job = registry.allocate_job_id();
    fixtures::enqueue_drop_index(catalog.as_ref(), table_id, "idx", drop_job).await;
    registry.spawn(table_id, drop_job).wait().await.unwrap();

    let table = catalog.read_table(table_id).await.unwrap();
    assert!(table.find_index("idx").is_none());
    assert!(table.mutations.is_empty());
}

#[tokio::test]
async fn test_constraint_job_validates_constraint() {
    let catalog: Arc<tessera_catalog::InMemoryCatalog> =
        Arc::new(tessera_catalog::InMemoryCatalog::new());
    let rows = Arc::new(InMemoryRowStore::new());
    let table_id = fixtures::create_table(catalog.as_ref(), "t", &["i", "j"]).await;
    let registry = registry(Arc::clone(&catalog) as _, Arc::clone(&rows));

    let job_id = registry.allocate_job_id();
    fixtures::enqueue_add_check_constraint(catalog.as_ref(), table_id, "c", "j > 1", job_id)
        .await;
    registry.spawn(table_id, job_id).wait().await.unwrap();

    let table = catalog.read_table(table_id).await.unwrap();
    let constraint = table.constraints.iter().find(|c| c.name == "c").unwrap();
    assert_eq!(constraint.validity, ConstraintValidity::Validated);
    assert!(table.mutations.is_empty());
}
