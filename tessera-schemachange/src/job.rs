//! Asynchronous schema-change job execution.
//!
//! Each queued mutation is driven to its terminal state by one job running
//! as an independently scheduled task, decoupled from the session that
//! queued it. Jobs step mutation states forward one committed descriptor
//! version at a time, run the backfill phase, pass the two named
//! checkpoints, and finalize under the descriptor's write intent. A
//! truncation that lands mid-job swaps the storage generation out from
//! under the backfill; finalization detects the swap and redoes the
//! backfill against the current generation so the job still converges.

use crate::checkpoint::CheckpointHook;
use crate::config::SchemaChangeConfig;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_catalog::CatalogStore;
use tessera_core::{
    CatalogResult, ConstraintValidity, DescriptorId, IndexId, JobCheckpoint, JobError, JobId,
    JobState, Mutation, MutationDirection, MutationElement, MutationState, StorageGeneration,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

// ============================================================================
// BACKFILL INTERFACE
// ============================================================================

/// Thin interface to the row storage a backfill reads and writes.
///
/// Actual backfill execution against real row data is out of scope; the
/// interface exposes only the entry accounting the jobs and tests need.
#[async_trait]
pub trait BackfillStore: Send + Sync {
    /// Rows stored under a table's storage generation.
    async fn row_count(&self, generation: StorageGeneration) -> u64;

    /// Replace the entry count of one index under a generation.
    async fn set_index_entries(&self, generation: StorageGeneration, index: IndexId, entries: u64);

    /// Entries stored for one index under a generation.
    async fn index_entries(&self, generation: StorageGeneration, index: IndexId) -> u64;

    /// Drop all entries of one index under a generation.
    async fn clear_index(&self, generation: StorageGeneration, index: IndexId);
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for schema-change job activity.
#[derive(Debug, Default)]
pub struct JobMetrics {
    pub jobs_started: AtomicU64,
    pub jobs_succeeded: AtomicU64,
    pub jobs_failed: AtomicU64,
    pub rows_backfilled: AtomicU64,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> JobMetricsSnapshot {
        JobMetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            rows_backfilled: self.rows_backfilled.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of job metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobMetricsSnapshot {
    pub jobs_started: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub rows_backfilled: u64,
}

// ============================================================================
// HANDLES & REGISTRY
// ============================================================================

/// Handle to one spawned schema-change job.
pub struct JobHandle {
    pub id: JobId,
    state: watch::Receiver<JobState>,
    handle: JoinHandle<CatalogResult<()>>,
}

impl JobHandle {
    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Wait for the job task to finish and return its outcome.
    pub async fn wait(self) -> CatalogResult<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(_) => Err(JobError::ShutDown { job_id: self.id }.into()),
        }
    }
}

/// Spawns and tracks schema-change jobs.
pub struct JobRegistry {
    catalog: Arc<dyn CatalogStore>,
    rows: Arc<dyn BackfillStore>,
    hook: Arc<dyn CheckpointHook>,
    config: SchemaChangeConfig,
    metrics: Arc<JobMetrics>,
    next_job_id: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl JobRegistry {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        rows: Arc<dyn BackfillStore>,
        hook: Arc<dyn CheckpointHook>,
        config: SchemaChangeConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            catalog,
            rows,
            hook,
            config,
            metrics: Arc::new(JobMetrics::new()),
            next_job_id: AtomicU64::new(0),
            shutdown,
        }
    }

    /// Allocate the id for a job about to be recorded on a mutation.
    pub fn allocate_job_id(&self) -> JobId {
        JobId(self.next_job_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn metrics(&self) -> Arc<JobMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Spawn the job task for a mutation already committed to the
    /// descriptor's queue under `job_id`.
    pub fn spawn(&self, descriptor: DescriptorId, job_id: JobId) -> JobHandle {
        let (state_tx, state_rx) = watch::channel(JobState::Pending);
        let ctx = JobContext {
            catalog: Arc::clone(&self.catalog),
            rows: Arc::clone(&self.rows),
            hook: Arc::clone(&self.hook),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
            shutdown: self.shutdown.subscribe(),
            descriptor,
            job_id,
            state: state_tx,
        };
        let handle = tokio::spawn(run_schema_change(ctx));
        JobHandle {
            id: job_id,
            state: state_rx,
            handle,
        }
    }

    /// Signal shutdown and give running jobs the configured grace period.
    pub async fn shutdown(&self, handles: Vec<JobHandle>) -> Vec<CatalogResult<()>> {
        let _ = self.shutdown.send(true);
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let job_id = handle.id;
            match tokio::time::timeout(self.config.shutdown_grace, handle.wait()).await {
                Ok(result) => results.push(result),
                Err(_) => results.push(Err(JobError::ShutDown { job_id }.into())),
            }
        }
        results
    }
}

// ============================================================================
// JOB EXECUTION
// ============================================================================

struct JobContext {
    catalog: Arc<dyn CatalogStore>,
    rows: Arc<dyn BackfillStore>,
    hook: Arc<dyn CheckpointHook>,
    config: SchemaChangeConfig,
    metrics: Arc<JobMetrics>,
    shutdown: watch::Receiver<bool>,
    descriptor: DescriptorId,
    job_id: JobId,
    state: watch::Sender<JobState>,
}

impl JobContext {
    fn set_state(&self, state: JobState) {
        let _ = self.state.send(state);
    }

    fn check_shutdown(&self) -> Result<(), JobError> {
        if *self.shutdown.borrow() {
            return Err(JobError::ShutDown {
                job_id: self.job_id,
            });
        }
        Ok(())
    }

    /// Invoke the installed hook at a named checkpoint. The job is Paused
    /// for as long as the hook blocks.
    async fn checkpoint(&self, checkpoint: JobCheckpoint) -> Result<(), JobError> {
        self.set_state(JobState::Paused(checkpoint));
        let result = self.hook.on_checkpoint(self.job_id, checkpoint).await;
        self.set_state(JobState::Running);
        result
    }
}

/// The mutation as prepared for the backfill phase, with the storage
/// generation observed at preparation time.
struct PreparedMutation {
    mutation: Mutation,
    generation: StorageGeneration,
}

struct BackfillResult {
    generation: StorageGeneration,
    index: IndexId,
}

async fn run_schema_change(ctx: JobContext) -> CatalogResult<()> {
    ctx.metrics.jobs_started.fetch_add(1, Ordering::Relaxed);
    let result = execute(&ctx).await;
    match &result {
        Ok(()) => {
            ctx.metrics.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
            ctx.set_state(JobState::Succeeded);
        }
        Err(err) => {
            tracing::warn!(job_id = %ctx.job_id, error = %err, "schema change failed, rolling back mutation");
            ctx.metrics.jobs_failed.fetch_add(1, Ordering::Relaxed);
            if let Err(rollback_err) = roll_back_mutation(&ctx).await {
                tracing::warn!(
                    job_id = %ctx.job_id,
                    error = %rollback_err,
                    "mutation rollback failed"
                );
            }
            ctx.set_state(JobState::Failed);
        }
    }
    result
}

async fn execute(ctx: &JobContext) -> CatalogResult<()> {
    ctx.set_state(JobState::Running);

    ctx.checkpoint(JobCheckpoint::BeforeResume).await?;
    ctx.check_shutdown()?;

    let prepared = step_to_backfill(ctx).await?;
    let backfilled = run_backfill(ctx, &prepared).await?;

    ctx.checkpoint(JobCheckpoint::AfterBackfill).await?;
    ctx.check_shutdown()?;

    finalize(ctx, backfilled).await
}

/// Step the mutation's state forward, one committed descriptor version per
/// transition, until it is ready for the backfill phase.
async fn step_to_backfill(ctx: &JobContext) -> CatalogResult<PreparedMutation> {
    loop {
        let _intent = ctx.catalog.write_intent(ctx.descriptor).await;
        let mut table = ctx.catalog.read_table_for_write(ctx.descriptor).await?;
        let generation = table.storage_generation;
        let pos = table
            .mutations
            .iter()
            .position(|m| m.job_id == ctx.job_id)
            .ok_or(JobError::MutationMissing {
                job_id: ctx.job_id,
                descriptor: ctx.descriptor,
            })?;
        let mutation = &mut table.descriptor_mut().mutations[pos];

        let ready = match mutation.direction {
            MutationDirection::Add => mutation.state == MutationState::Backfilling,
            MutationDirection::Drop => mutation.state == MutationState::DeleteOnly,
        };
        if ready {
            return Ok(PreparedMutation {
                mutation: mutation.clone(),
                generation,
            });
        }

        let mut changed = mutation.advance();
        if let MutationElement::Constraint(constraint) = &mut mutation.element {
            if constraint.validity == ConstraintValidity::Unvalidated {
                constraint.validity = ConstraintValidity::Validating;
                changed = true;
            }
        }
        if !changed {
            // Already terminal; nothing left to step.
            return Ok(PreparedMutation {
                mutation: mutation.clone(),
                generation,
            });
        }
        if ctx.config.log_progress {
            tracing::debug!(
                job_id = %ctx.job_id,
                state = %table.mutations[pos].state,
                "stepped mutation state"
            );
        }
        ctx.catalog.commit_table(table).await?;
    }
}

/// Populate a new index from the rows of the generation observed during
/// preparation. Other mutation kinds have no entries to write; constraint
/// validation scans the table without producing output.
async fn run_backfill(
    ctx: &JobContext,
    prepared: &PreparedMutation,
) -> CatalogResult<Option<BackfillResult>> {
    match (&prepared.mutation.direction, &prepared.mutation.element) {
        (MutationDirection::Add, MutationElement::Index(index)) => {
            let total = ctx.rows.row_count(prepared.generation).await;
            let mut written = 0u64;
            while written < total {
                let chunk = ctx.config.backfill_batch_size.min(total - written);
                written += chunk;
                ctx.rows
                    .set_index_entries(prepared.generation, index.id, written)
                    .await;
                ctx.metrics.rows_backfilled.fetch_add(chunk, Ordering::Relaxed);
                tokio::task::yield_now().await;
            }
            if total == 0 {
                ctx.rows
                    .set_index_entries(prepared.generation, index.id, 0)
                    .await;
            }
            if ctx.config.log_progress {
                tracing::info!(
                    job_id = %ctx.job_id,
                    index = %index.name,
                    rows = total,
                    "index backfill complete"
                );
            }
            Ok(Some(BackfillResult {
                generation: prepared.generation,
                index: index.id,
            }))
        }
        (MutationDirection::Add, MutationElement::Constraint(_)) => {
            // Validation pass over the current rows.
            let _ = ctx.rows.row_count(prepared.generation).await;
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Apply the mutation's terminal effect under write intent: promote added
/// elements, remove dropped ones, retire the queue entry, and commit one
/// version bump.
async fn finalize(ctx: &JobContext, backfilled: Option<BackfillResult>) -> CatalogResult<()> {
    let _intent = ctx.catalog.write_intent(ctx.descriptor).await;
    let mut table = ctx.catalog.read_table_for_write(ctx.descriptor).await?;

    // Truncation may have swapped the storage identity since the backfill
    // ran; redo it against the current generation so the index converges to
    // the truncated row count.
    if let Some(backfill) = &backfilled {
        let current = table.storage_generation;
        if current != backfill.generation {
            let rows = ctx.rows.row_count(current).await;
            ctx.rows.set_index_entries(current, backfill.index, rows).await;
            tracing::info!(
                job_id = %ctx.job_id,
                rows,
                "storage generation changed mid-backfill, re-backfilled index"
            );
        }
    }

    let pos = table
        .mutations
        .iter()
        .position(|m| m.job_id == ctx.job_id)
        .ok_or(JobError::MutationMissing {
            job_id: ctx.job_id,
            descriptor: ctx.descriptor,
        })?;
    let mutation = table.descriptor_mut().mutations.remove(pos);
    let current_generation = table.storage_generation;

    match (mutation.direction, mutation.element) {
        (MutationDirection::Add, MutationElement::Index(index)) => {
            table.descriptor_mut().indexes.push(index);
        }
        (MutationDirection::Add, MutationElement::Column(column)) => {
            table.descriptor_mut().columns.push(column);
        }
        (MutationDirection::Add, MutationElement::Constraint(mut constraint)) => {
            constraint.validity = ConstraintValidity::Validated;
            table.descriptor_mut().constraints.push(constraint);
        }
        (MutationDirection::Drop, MutationElement::Index(index)) => {
            table.descriptor_mut().indexes.retain(|i| i.id != index.id);
            ctx.rows.clear_index(current_generation, index.id).await;
        }
        (MutationDirection::Drop, MutationElement::Column(column)) => {
            table.descriptor_mut().columns.retain(|c| c.id != column.id);
        }
        (MutationDirection::Drop, MutationElement::Constraint(constraint)) => {
            table
                .descriptor_mut()
                .constraints
                .retain(|c| c.name != constraint.name);
        }
    }

    ctx.catalog.commit_table(table).await?;
    if ctx.config.log_progress {
        tracing::info!(job_id = %ctx.job_id, "schema change complete");
    }
    Ok(())
}

/// Undo the failed job's mutation: discard a half-added element along with
/// any partial index entries it wrote, or restore a half-dropped element
/// to the public lists.
async fn roll_back_mutation(ctx: &JobContext) -> CatalogResult<()> {
    let _intent = ctx.catalog.write_intent(ctx.descriptor).await;
    let mut table = ctx.catalog.read_table_for_write(ctx.descriptor).await?;
    let Some(pos) = table.mutations.iter().position(|m| m.job_id == ctx.job_id) else {
        return Ok(());
    };
    let mutation = table.descriptor_mut().mutations.remove(pos);
    let generation = table.storage_generation;
    match (mutation.direction, mutation.element) {
        (MutationDirection::Add, MutationElement::Index(index)) => {
            ctx.rows.clear_index(generation, index.id).await;
        }
        (MutationDirection::Add, _) => {}
        (MutationDirection::Drop, MutationElement::Index(index)) => {
            table.descriptor_mut().indexes.push(index);
        }
        (MutationDirection::Drop, MutationElement::Column(column)) => {
            table.descriptor_mut().columns.push(column);
        }
        (MutationDirection::Drop, MutationElement::Constraint(constraint)) => {
            table.descriptor_mut().constraints.push(constraint);
        }
    }
    ctx.catalog.commit_table(table).await?;
    Ok(())
}
