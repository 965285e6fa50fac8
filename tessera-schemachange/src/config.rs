//! Configuration for the schema-change job coordinator.

use std::time::Duration;

const DEFAULT_BACKFILL_BATCH_SIZE: u64 = 1000;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

/// Configuration for schema-change job execution.
#[derive(Debug, Clone)]
pub struct SchemaChangeConfig {
    /// Rows written per backfill chunk before yielding to the scheduler
    /// (default: 1000)
    pub backfill_batch_size: u64,

    /// How long shutdown waits for running jobs before abandoning them
    /// (default: 30 seconds)
    pub shutdown_grace: Duration,

    /// Whether to log per-job progress (default: true)
    pub log_progress: bool,
}

impl Default for SchemaChangeConfig {
    fn default() -> Self {
        Self {
            backfill_batch_size: DEFAULT_BACKFILL_BATCH_SIZE,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            log_progress: true,
        }
    }
}

impl SchemaChangeConfig {
    /// Create SchemaChangeConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `TESSERA_SC_BACKFILL_BATCH_SIZE`: rows per backfill chunk (default: 1000)
    /// - `TESSERA_SC_SHUTDOWN_GRACE_SECS`: shutdown grace period (default: 30)
    /// - `TESSERA_SC_LOG_PROGRESS`: whether to log job progress (default: true)
    pub fn from_env() -> Self {
        let backfill_batch_size = std::env::var("TESSERA_SC_BACKFILL_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BACKFILL_BATCH_SIZE);

        let shutdown_grace = Duration::from_secs(
            std::env::var("TESSERA_SC_SHUTDOWN_GRACE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
        );

        let log_progress = std::env::var("TESSERA_SC_LOG_PROGRESS")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            backfill_batch_size,
            shutdown_grace,
            log_progress,
        }
    }

    /// Configuration for development/testing with small batches.
    pub fn development() -> Self {
        Self {
            backfill_batch_size: 10,
            shutdown_grace: Duration::from_secs(1),
            log_progress: true,
        }
    }
}
