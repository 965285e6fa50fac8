//! TESSERA Test Utilities
//!
//! Centralized test infrastructure for the TESSERA workspace:
//! - A blocking checkpoint hook for constructing race-condition scenarios
//! - An in-memory row store standing in for table data
//! - Descriptor and mutation fixtures

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::{IndexId, JobCheckpoint, JobError, JobId, StorageGeneration};
use tessera_schemachange::{BackfillStore, CheckpointHook};
use tokio::sync::{mpsc, Mutex, RwLock};

pub mod fixtures;

// ============================================================================
// BLOCKING CHECKPOINT HOOK
// ============================================================================

/// Checkpoint hook that blocks jobs at one target checkpoint until the
/// controller releases them, optionally injecting a failure instead.
///
/// Non-target checkpoints pass through immediately. Dropping the
/// controller releases every blocked and future invocation with
/// "continue", so a test that never unblocks still shuts down cleanly.
pub struct BlockingHook {
    target: JobCheckpoint,
    blocked_tx: mpsc::UnboundedSender<JobId>,
    release: Mutex<mpsc::UnboundedReceiver<Result<(), String>>>,
}

/// Test-side handle for a [`BlockingHook`].
pub struct BlockingHookController {
    blocked_rx: Mutex<mpsc::UnboundedReceiver<JobId>>,
    release_tx: mpsc::UnboundedSender<Result<(), String>>,
}

/// Create a hook blocking at `target` and its controller.
pub fn blocking_hook(target: JobCheckpoint) -> (Arc<BlockingHook>, BlockingHookController) {
    let (blocked_tx, blocked_rx) = mpsc::unbounded_channel();
    let (release_tx, release_rx) = mpsc::unbounded_channel();
    (
        Arc::new(BlockingHook {
            target,
            blocked_tx,
            release: Mutex::new(release_rx),
        }),
        BlockingHookController {
            blocked_rx: Mutex::new(blocked_rx),
            release_tx,
        },
    )
}

#[async_trait]
impl CheckpointHook for BlockingHook {
    async fn on_checkpoint(
        &self,
        job_id: JobId,
        checkpoint: JobCheckpoint,
    ) -> Result<(), JobError> {
        if checkpoint != self.target {
            return Ok(());
        }
        let _ = self.blocked_tx.send(job_id);
        let release = self.release.lock().await.recv().await;
        match release {
            // Controller dropped: release everything.
            None | Some(Ok(())) => Ok(()),
            Some(Err(reason)) => Err(JobError::CheckpointFailed {
                job_id,
                checkpoint,
                reason,
            }),
        }
    }
}

impl BlockingHookController {
    /// Wait until a job reaches the target checkpoint; returns its id.
    pub async fn wait_blocked(&self) -> JobId {
        self.blocked_rx
            .lock()
            .await
            .recv()
            .await
            .expect("blocking hook dropped before any job reached the checkpoint")
    }

    /// Release one blocked invocation with "continue".
    pub fn release(&self) {
        let _ = self.release_tx.send(Ok(()));
    }

    /// Release one blocked invocation with an injected failure.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.release_tx.send(Err(reason.into()));
    }
}

// ============================================================================
// IN-MEMORY ROW STORE
// ============================================================================

/// In-memory stand-in for table row storage, keyed by storage generation.
///
/// A generation that was never written reads as empty, which is exactly
/// how a freshly truncated table behaves.
#[derive(Default)]
pub struct InMemoryRowStore {
    rows: RwLock<HashMap<StorageGeneration, u64>>,
    index_entries: RwLock<HashMap<(StorageGeneration, IndexId), u64>>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a generation with `count` rows.
    pub async fn seed_rows(&self, generation: StorageGeneration, count: u64) {
        self.rows.write().await.insert(generation, count);
    }
}

#[async_trait]
impl BackfillStore for InMemoryRowStore {
    async fn row_count(&self, generation: StorageGeneration) -> u64 {
        self.rows.read().await.get(&generation).copied().unwrap_or(0)
    }

    async fn set_index_entries(&self, generation: StorageGeneration, index: IndexId, entries: u64) {
        self.index_entries
            .write()
            .await
            .insert((generation, index), entries);
    }

    async fn index_entries(&self, generation: StorageGeneration, index: IndexId) -> u64 {
        self.index_entries
            .read()
            .await
            .get(&(generation, index))
            .copied()
            .unwrap_or(0)
    }

    async fn clear_index(&self, generation: StorageGeneration, index: IndexId) {
        self.index_entries.write().await.remove(&(generation, index));
    }
}
