//! TESSERA Catalog - Descriptor Build Pipeline & Store
//!
//! Decodes raw descriptor state into typed Immutable/Mutable views, runs
//! post-deserialization fixups and registered migrations, and persists
//! descriptors with strict version accounting. The distributed KV store
//! backing a real deployment is out of scope; `InMemoryCatalog` stands in
//! for it.

pub mod builder;
pub mod encoding;
pub mod fixups;
pub mod migrations;
pub mod store;

pub use builder::{
    new_initial_database, DatabaseDescriptorBuilder, DatabaseMigrationFn, ImmutableDatabase,
    ImmutableTable, MutableDatabase, MutableTable, TableDescriptorBuilder, TableMigrationFn,
};
pub use encoding::{
    decode, decode_database, decode_table, encode, encode_database, encode_table,
    DescriptorPayload, FORMAT_VERSION,
};
pub use store::{CatalogStore, InMemoryCatalog, WriteIntent};
