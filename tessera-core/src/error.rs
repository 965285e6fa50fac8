//! Error types for TESSERA catalog operations.

use crate::enums::{ConstraintKind, DescriptorType, JobCheckpoint};
use crate::identity::{DescriptorId, DescriptorVersion, JobId};
use thiserror::Error;

/// Broad classification of an error, used by the statement surface to pick
/// the wire-level error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Persisted state could not be understood; fatal, never retried.
    Corruption,
    /// The request is valid but unsupported in the catalog's current
    /// configuration; safe to retry once the blocking work completes.
    UnsupportedConfiguration,
    /// Everything else.
    Internal,
}

/// Decoding a persisted descriptor failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed descriptor payload: {reason}")]
    Malformed { reason: String },

    #[error("descriptor format version {found} is newer than supported version {max}")]
    UnsupportedFormatVersion { found: u32, max: u32 },

    #[error("expected a {expected} descriptor, found a {found} descriptor")]
    WrongDescriptorType {
        expected: DescriptorType,
        found: DescriptorType,
    },
}

/// A registered migration step failed; surfaced unchanged by the builder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("migration {migration} failed: {reason}")]
pub struct MigrationError {
    pub migration: &'static str,
    pub reason: String,
}

/// Catalog store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("descriptor {id} not found")]
    NotFound { id: DescriptorId },

    #[error("descriptor {id} already exists")]
    AlreadyExists { id: DescriptorId },

    #[error("relation \"{name}\" does not exist")]
    NameNotFound { name: String },

    #[error("descriptor {id} version conflict: expected to commit {expected}, stored version is {stored}")]
    VersionConflict {
        id: DescriptorId,
        expected: DescriptorVersion,
        stored: DescriptorVersion,
    },

    #[error("descriptor {id} is not a {expected} descriptor")]
    DescriptorTypeMismatch {
        id: DescriptorId,
        expected: DescriptorType,
    },
}

/// A pending mutation disqualified the requested truncation.
///
/// Exactly one reason category per rejection, carrying the identifying
/// object name; categories are never merged or summarized away.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TruncateRejection {
    #[error("cannot perform TRUNCATE on \"{table}\" which has indexes being dropped")]
    IndexBeingDropped { table: String },

    #[error(
        "cannot perform TRUNCATE on \"{table}\" which has a column (\"{column}\") being dropped which depends on another object"
    )]
    DependentColumnBeingDropped { table: String, column: String },

    #[error("cannot perform TRUNCATE on \"{table}\" which has an ongoing primary key change")]
    PrimaryKeyChange { table: String },

    #[error("cannot perform TRUNCATE on \"{table}\" which has an ongoing {kind} constraint change")]
    ConstraintChange {
        table: String,
        /// `Check` or `ForeignKey`; primary-key changes use their own
        /// category above.
        kind: ConstraintKind,
    },
}

impl TruncateRejection {
    /// Rejections are not data-correctness faults.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::UnsupportedConfiguration
    }
}

/// Schema-change job errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job {job_id} failed at {checkpoint} checkpoint: {reason}")]
    CheckpointFailed {
        job_id: JobId,
        checkpoint: JobCheckpoint,
        reason: String,
    },

    #[error("job {job_id} has no pending mutation on descriptor {descriptor}")]
    MutationMissing {
        job_id: JobId,
        descriptor: DescriptorId,
    },

    #[error("job {job_id} was shut down before completion")]
    ShutDown { job_id: JobId },
}

/// Master error type for all TESSERA catalog errors.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("unsupported: {0}")]
    Truncate(#[from] TruncateRejection),

    #[error("job error: {0}")]
    Job(#[from] JobError),
}

impl CatalogError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CatalogError::Decode(_) => ErrorClass::Corruption,
            CatalogError::Truncate(r) => r.class(),
            _ => ErrorClass::Internal,
        }
    }
}

/// Result type alias for TESSERA catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages_name_the_blocker() {
        let err = TruncateRejection::IndexBeingDropped {
            table: "t".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "cannot perform TRUNCATE on \"t\" which has indexes being dropped"
        );

        let err = TruncateRejection::DependentColumnBeingDropped {
            table: "t".to_string(),
            column: "k".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "cannot perform TRUNCATE on \"t\" which has a column (\"k\") being dropped which depends on another object"
        );

        let err = TruncateRejection::ConstraintChange {
            table: "t".to_string(),
            kind: ConstraintKind::ForeignKey,
        };
        assert_eq!(
            format!("{err}"),
            "cannot perform TRUNCATE on \"t\" which has an ongoing FOREIGN_KEY constraint change"
        );

        let err = TruncateRejection::PrimaryKeyChange {
            table: "t".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "cannot perform TRUNCATE on \"t\" which has an ongoing primary key change"
        );
    }

    #[test]
    fn test_rejections_are_unsupported_configuration_class() {
        let err = TruncateRejection::PrimaryKeyChange {
            table: "t".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::UnsupportedConfiguration);
        let master = CatalogError::from(err);
        assert_eq!(master.class(), ErrorClass::UnsupportedConfiguration);
    }

    #[test]
    fn test_decode_errors_are_corruption_class() {
        let err = CatalogError::from(DecodeError::Malformed {
            reason: "truncated payload".to_string(),
        });
        assert_eq!(err.class(), ErrorClass::Corruption);
    }

    #[test]
    fn test_master_error_from_conversions() {
        let store = CatalogError::from(StoreError::NotFound {
            id: DescriptorId(52),
        });
        assert!(matches!(store, CatalogError::Store(_)));

        let migration = CatalogError::from(MigrationError {
            migration: "grant-options",
            reason: "boom".to_string(),
        });
        assert!(matches!(migration, CatalogError::Migration(_)));

        let job = CatalogError::from(JobError::ShutDown { job_id: JobId(9) });
        assert!(matches!(job, CatalogError::Job(_)));
    }
}
