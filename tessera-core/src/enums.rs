//! Enum types for TESSERA descriptors and schema-change jobs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DESCRIPTOR ENUMS
// ============================================================================

/// Kind of catalog object a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorType {
    Table,
    Database,
}

impl fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorType::Table => write!(f, "table"),
            DescriptorType::Database => write!(f, "database"),
        }
    }
}

// ============================================================================
// MUTATION ENUMS
// ============================================================================

/// Direction of a queued structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationDirection {
    Add,
    Drop,
}

impl MutationDirection {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MutationDirection::Add => "ADD",
            MutationDirection::Drop => "DROP",
        }
    }
}

impl fmt::Display for MutationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Progress state of a queued mutation.
///
/// ADD mutations step `DeleteOnly → WriteOnly → Backfilling → Public`.
/// DROP mutations mirror backwards, `WriteOnly → DeleteOnly`, and leave the
/// queue on completion instead of reaching a public state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationState {
    DeleteOnly,
    WriteOnly,
    Backfilling,
    Public,
}

impl MutationState {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MutationState::DeleteOnly => "DELETE_ONLY",
            MutationState::WriteOnly => "WRITE_ONLY",
            MutationState::Backfilling => "BACKFILLING",
            MutationState::Public => "PUBLIC",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, MutationStateParseError> {
        match s.to_uppercase().as_str() {
            "DELETE_ONLY" => Ok(MutationState::DeleteOnly),
            "WRITE_ONLY" => Ok(MutationState::WriteOnly),
            "BACKFILLING" => Ok(MutationState::Backfilling),
            "PUBLIC" => Ok(MutationState::Public),
            _ => Err(MutationStateParseError(s.to_string())),
        }
    }

    /// The state a mutation steps to next, or `None` once it is terminal.
    ///
    /// Terminal means `Public` for ADD mutations; for DROP mutations the
    /// element is removed from the queue after `DeleteOnly` completes.
    pub fn next_for(&self, direction: MutationDirection) -> Option<MutationState> {
        match direction {
            MutationDirection::Add => match self {
                MutationState::DeleteOnly => Some(MutationState::WriteOnly),
                MutationState::WriteOnly => Some(MutationState::Backfilling),
                MutationState::Backfilling => Some(MutationState::Public),
                MutationState::Public => None,
            },
            MutationDirection::Drop => match self {
                MutationState::Public => Some(MutationState::WriteOnly),
                MutationState::Backfilling => Some(MutationState::WriteOnly),
                MutationState::WriteOnly => Some(MutationState::DeleteOnly),
                MutationState::DeleteOnly => None,
            },
        }
    }
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for MutationState {
    type Err = MutationStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid mutation state string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationStateParseError(pub String);

impl fmt::Display for MutationStateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid mutation state: {}", self.0)
    }
}

impl std::error::Error for MutationStateParseError {}

// ============================================================================
// CONSTRAINT ENUMS
// ============================================================================

/// Kind of table constraint a mutation changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    Check,
    ForeignKey,
    PrimaryKey,
}

impl ConstraintKind {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ConstraintKind::Check => "CHECK",
            ConstraintKind::ForeignKey => "FOREIGN_KEY",
            ConstraintKind::PrimaryKey => "PRIMARY_KEY",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Validation progress of a constraint change.
///
/// `Validating` is the mid-validation sub-state the job checkpoint contract
/// requires to be distinguishable for FK, CHECK and PK changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintValidity {
    Unvalidated,
    Validating,
    Validated,
}

// ============================================================================
// JOB ENUMS
// ============================================================================

/// Named pause checkpoint in a schema-change job's execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobCheckpoint {
    /// After backfill completes, before marking the element public.
    AfterBackfill,
    /// Before a paused job resumes execution.
    BeforeResume,
}

impl JobCheckpoint {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            JobCheckpoint::AfterBackfill => "after-backfill",
            JobCheckpoint::BeforeResume => "before-resume",
        }
    }
}

impl fmt::Display for JobCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Lifecycle state of a schema-change job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Paused(JobCheckpoint),
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Paused(cp) => write!(f, "paused at {cp}"),
            JobState::Succeeded => write!(f, "succeeded"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}
