//! Catalog store abstraction and in-memory implementation.
//!
//! The real deployment keys serialized descriptors in the distributed KV
//! store; `InMemoryCatalog` stands in for it here. Reads run the full
//! build pipeline (decode, fixups, registered migrations); commits enforce
//! that a descriptor's version increments by exactly one.

use crate::builder::{
    DatabaseDescriptorBuilder, ImmutableDatabase, ImmutableTable, MutableDatabase, MutableTable,
    TableDescriptorBuilder, TableMigrationFn,
};
use crate::encoding::{encode_database, encode_table, DescriptorPayload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tessera_core::{CatalogResult, DescriptorId, DescriptorVersion, StoreError};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive write intent on one descriptor.
///
/// Holding the intent serializes writers on the descriptor; classification
/// and the subsequent truncation (or job finalization) run under one
/// intent so no mutation can be queued in between. Dropped on scope exit.
pub struct WriteIntent {
    descriptor: DescriptorId,
    _guard: OwnedMutexGuard<()>,
}

impl WriteIntent {
    pub fn descriptor(&self) -> DescriptorId {
        self.descriptor
    }
}

/// Storage abstraction for the schema catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Read and build an immutable table snapshot.
    async fn read_table(&self, id: DescriptorId) -> CatalogResult<ImmutableTable>;

    /// Read and build a mutable table for a read-modify-write cycle.
    async fn read_table_for_write(&self, id: DescriptorId) -> CatalogResult<MutableTable>;

    /// Persist a mutable table. The committed version must be exactly one
    /// past the stored version (or [`DescriptorVersion::INITIAL`] for a
    /// created descriptor).
    async fn commit_table(&self, table: MutableTable) -> CatalogResult<ImmutableTable>;

    /// Read and build an immutable database snapshot.
    async fn read_database(&self, id: DescriptorId) -> CatalogResult<ImmutableDatabase>;

    /// Persist a mutable database under the same versioning rule.
    async fn commit_database(&self, database: MutableDatabase) -> CatalogResult<ImmutableDatabase>;

    /// Resolve a table name to its descriptor id.
    async fn lookup_table(&self, name: &str) -> CatalogResult<DescriptorId>;

    /// Acquire exclusive write intent on a descriptor, waiting for any
    /// current holder to release it.
    async fn write_intent(&self, id: DescriptorId) -> WriteIntent;
}

/// In-memory catalog store.
pub struct InMemoryCatalog {
    records: RwLock<HashMap<DescriptorId, Vec<u8>>>,
    intents: std::sync::Mutex<HashMap<DescriptorId, Arc<Mutex<()>>>>,
    table_migrations: Vec<TableMigrationFn>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            intents: std::sync::Mutex::new(HashMap::new()),
            table_migrations: Vec::new(),
        }
    }

    /// A catalog that applies the given migration steps on every table
    /// build.
    pub fn with_table_migrations(migrations: Vec<TableMigrationFn>) -> Self {
        Self {
            table_migrations: migrations,
            ..Self::new()
        }
    }

    fn raw(&self, id: DescriptorId) -> CatalogResult<Vec<u8>> {
        self.records
            .read()
            .expect("catalog lock poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id }.into())
    }

    fn table_builder(&self, id: DescriptorId) -> CatalogResult<TableDescriptorBuilder> {
        let bytes = self.raw(id)?;
        let mut builder = TableDescriptorBuilder::from_bytes(&bytes)?;
        builder.run_post_deserialization_changes();
        builder.run_migration_changes(&self.table_migrations)?;
        Ok(builder)
    }

    fn intent_lock(&self, id: DescriptorId) -> Arc<Mutex<()>> {
        let mut intents = self.intents.lock().expect("intent registry poisoned");
        intents.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn read_table(&self, id: DescriptorId) -> CatalogResult<ImmutableTable> {
        Ok(self.table_builder(id)?.build_immutable())
    }

    async fn read_table_for_write(&self, id: DescriptorId) -> CatalogResult<MutableTable> {
        Ok(self.table_builder(id)?.build_existing_mutable())
    }

    async fn commit_table(&self, table: MutableTable) -> CatalogResult<ImmutableTable> {
        let id = table.id;
        let mut records = self.records.write().expect("catalog lock poisoned");
        match table.cluster_version() {
            Some(baseline) => {
                // Existing descriptor: the stored record must still be at
                // the baseline version, and the commit moves one past it.
                if !records.contains_key(&id) {
                    return Err(StoreError::NotFound { id }.into());
                }
                let stored = crate::encoding::decode_table(&records[&id])?;
                if stored.version != baseline.version {
                    return Err(StoreError::VersionConflict {
                        id,
                        expected: baseline.version,
                        stored: stored.version,
                    }
                    .into());
                }
                let mut desc = table.into_descriptor();
                desc.version = stored.version.next();
                desc.modification_time = chrono::Utc::now();
                records.insert(id, encode_table(&desc)?);
                Ok(TableDescriptorBuilder::new(&desc).build_immutable())
            }
            None => {
                if records.contains_key(&id) {
                    return Err(StoreError::AlreadyExists { id }.into());
                }
                let mut desc = table.into_descriptor();
                desc.version = DescriptorVersion::INITIAL;
                desc.modification_time = chrono::Utc::now();
                records.insert(id, encode_table(&desc)?);
                Ok(TableDescriptorBuilder::new(&desc).build_immutable())
            }
        }
    }

    async fn read_database(&self, id: DescriptorId) -> CatalogResult<ImmutableDatabase> {
        let bytes = self.raw(id)?;
        let mut builder = DatabaseDescriptorBuilder::from_bytes(&bytes)?;
        builder.run_post_deserialization_changes();
        Ok(builder.build_immutable())
    }

    async fn commit_database(&self, database: MutableDatabase) -> CatalogResult<ImmutableDatabase> {
        let id = database.id;
        let mut records = self.records.write().expect("catalog lock poisoned");
        match database.cluster_version() {
            Some(baseline) => {
                if !records.contains_key(&id) {
                    return Err(StoreError::NotFound { id }.into());
                }
                let stored = crate::encoding::decode_database(&records[&id])?;
                if stored.version != baseline.version {
                    return Err(StoreError::VersionConflict {
                        id,
                        expected: baseline.version,
                        stored: stored.version,
                    }
                    .into());
                }
                let mut desc = database.into_descriptor();
                desc.version = stored.version.next();
                desc.modification_time = chrono::Utc::now();
                records.insert(id, encode_database(&desc)?);
                Ok(DatabaseDescriptorBuilder::new(&desc).build_immutable())
            }
            None => {
                if records.contains_key(&id) {
                    return Err(StoreError::AlreadyExists { id }.into());
                }
                let mut desc = database.into_descriptor();
                desc.version = DescriptorVersion::INITIAL;
                desc.modification_time = chrono::Utc::now();
                records.insert(id, encode_database(&desc)?);
                Ok(DatabaseDescriptorBuilder::new(&desc).build_immutable())
            }
        }
    }

    async fn lookup_table(&self, name: &str) -> CatalogResult<DescriptorId> {
        let records = self.records.read().expect("catalog lock poisoned");
        for bytes in records.values() {
            if let DescriptorPayload::Table(t) = crate::encoding::decode(bytes)? {
                if t.name == name {
                    return Ok(t.id);
                }
            }
        }
        Err(StoreError::NameNotFound {
            name: name.to_string(),
        }
        .into())
    }

    async fn write_intent(&self, id: DescriptorId) -> WriteIntent {
        let lock = self.intent_lock(id);
        let guard = lock.lock_owned().await;
        WriteIntent {
            descriptor: id,
            _guard: guard,
        }
    }
}
