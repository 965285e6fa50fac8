//! Table truncation.
//!
//! Truncation empties a table by swapping its physical storage identity
//! rather than deleting rows individually. The executor itself is thin:
//! acquire write intent, classify the pending mutations, swap the
//! generation, commit. A rejected truncation performs no writes at all,
//! and an allowed one never cancels the pending jobs.

use crate::classifier::can_truncate_table;
use tessera_catalog::{CatalogStore, ImmutableTable};
use tessera_core::{CatalogResult, DescriptorId, StorageGeneration, TxnId};

/// A request to truncate one table inside a transaction.
#[derive(Debug, Clone, Copy)]
pub struct TruncateRequest {
    pub table: DescriptorId,
    pub txn: TxnId,
}

/// Truncate a table by descriptor id.
///
/// Write intent is acquired before classification runs; combined with the
/// catalog's transactional serialization this prevents a mutation from
/// being queued between classification and the storage swap. The path
/// never waits on an external unblock signal.
pub async fn truncate_table(
    catalog: &dyn CatalogStore,
    request: TruncateRequest,
) -> CatalogResult<ImmutableTable> {
    let _intent = catalog.write_intent(request.table).await;
    let mut table = catalog.read_table_for_write(request.table).await?;
    can_truncate_table(table.descriptor())?;

    let new_generation = StorageGeneration::new();
    tracing::info!(
        table = %table.name,
        txn = %request.txn,
        from = %table.storage_generation,
        to = %new_generation,
        "truncating table"
    );
    table.descriptor_mut().storage_generation = new_generation;
    catalog.commit_table(table).await
}

/// Statement surface: truncate a table by name.
pub async fn truncate_table_by_name(
    catalog: &dyn CatalogStore,
    name: &str,
    txn: TxnId,
) -> CatalogResult<ImmutableTable> {
    let table = catalog.lookup_table(name).await?;
    truncate_table(catalog, TruncateRequest { table, txn }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{CatalogError, StoreError, TruncateRejection};
    use tessera_test_utils::fixtures;

    #[tokio::test]
    async fn test_truncate_swaps_generation_and_bumps_version() {
        let catalog = tessera_catalog::InMemoryCatalog::new();
        let table_id = fixtures::create_table(&catalog, "t", &["i", "j"]).await;
        let before = catalog.read_table(table_id).await.unwrap();

        let after = truncate_table_by_name(&catalog, "t", TxnId::new())
            .await
            .unwrap();
        assert_ne!(after.storage_generation, before.storage_generation);
        assert_eq!(after.version, before.version.next());
    }

    #[tokio::test]
    async fn test_rejected_truncate_writes_nothing() {
        let catalog = tessera_catalog::InMemoryCatalog::new();
        let table_id = fixtures::create_table(&catalog, "t", &["i", "j"]).await;
        fixtures::enqueue_drop_index(&catalog, table_id, "idx", tessera_core::JobId(1)).await;
        let before = catalog.read_table(table_id).await.unwrap();

        let err = truncate_table_by_name(&catalog, "t", TxnId::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Truncate(TruncateRejection::IndexBeingDropped { .. })
        ));

        let after = catalog.read_table(table_id).await.unwrap();
        assert_eq!(after.version, before.version);
        assert_eq!(after.storage_generation, before.storage_generation);
        assert_eq!(after.mutations.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_table_name() {
        let catalog = tessera_catalog::InMemoryCatalog::new();
        let err = truncate_table_by_name(&catalog, "missing", TxnId::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Store(StoreError::NameNotFound { .. })
        ));
    }
}
