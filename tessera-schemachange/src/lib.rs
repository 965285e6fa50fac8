//! TESSERA Schema Change - Jobs, Checkpoints & Mutation-Safe Truncation
//!
//! Executes asynchronous schema-change jobs against the catalog, exposes
//! the two named pause checkpoints for test and operational control, and
//! classifies pending mutations to decide whether TRUNCATE may run
//! concurrently with them.

pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod job;
pub mod truncate;

pub use checkpoint::{CheckpointHook, PassThroughHook};
pub use classifier::{can_truncate_table, classify_mutations};
pub use config::SchemaChangeConfig;
pub use job::{
    BackfillStore, JobHandle, JobMetrics, JobMetricsSnapshot, JobRegistry,
};
pub use truncate::{truncate_table, truncate_table_by_name, TruncateRequest};
