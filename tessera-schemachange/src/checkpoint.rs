//! Job checkpoint hook surface.
//!
//! A schema-change job invokes the installed hook from its own execution
//! task at each named checkpoint. The hook either returns promptly with
//! "continue", blocks until an external signal releases it, or injects an
//! error that fails the job. The classifier and the TRUNCATE statement
//! never pass through a checkpoint; in production the pass-through hook is
//! installed and nothing ever suspends.

use async_trait::async_trait;
use tessera_core::{JobCheckpoint, JobError, JobId};

/// Cooperative blocking hook invoked at [`JobCheckpoint::AfterBackfill`]
/// and [`JobCheckpoint::BeforeResume`].
#[async_trait]
pub trait CheckpointHook: Send + Sync {
    /// Called by the job's own task. `Ok(())` continues execution; an
    /// error fails the job.
    async fn on_checkpoint(
        &self,
        job_id: JobId,
        checkpoint: JobCheckpoint,
    ) -> Result<(), JobError>;
}

/// Production default: continue immediately, never suspend.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughHook;

#[async_trait]
impl CheckpointHook for PassThroughHook {
    async fn on_checkpoint(
        &self,
        _job_id: JobId,
        _checkpoint: JobCheckpoint,
    ) -> Result<(), JobError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pass_through_never_blocks() {
        let hook = PassThroughHook;
        for checkpoint in [JobCheckpoint::AfterBackfill, JobCheckpoint::BeforeResume] {
            hook.on_checkpoint(JobId(1), checkpoint).await.unwrap();
        }
    }
}
