//! TESSERA Core - Descriptor Types
//!
//! Pure data structures with no behavior beyond construction and snapshot
//! helpers. All other crates depend on this. This crate contains ONLY data
//! types - the builder pipeline, classifier and job machinery live in
//! `tessera-catalog` and `tessera-schemachange`.

pub mod descriptor;
pub mod enums;
pub mod error;
pub mod identity;
pub mod mutation;
pub mod privilege;

pub use descriptor::{
    ColumnDescriptor, ConstraintDescriptor, DatabaseDescriptor, DependencyRef, IndexDescriptor,
    SchemaInfo, TableDescriptor,
};
pub use enums::{
    ConstraintKind, ConstraintValidity, DescriptorType, JobCheckpoint, JobState,
    MutationDirection, MutationState, MutationStateParseError,
};
pub use error::{
    CatalogError, CatalogResult, DecodeError, ErrorClass, JobError, MigrationError, StoreError,
    TruncateRejection,
};
pub use identity::{
    descriptor_fingerprint, ColumnId, DescriptorFingerprint, DescriptorId, DescriptorVersion,
    IndexId, JobId, StorageGeneration, Timestamp, TxnId,
};
pub use mutation::{Mutation, MutationElement};
pub use privilege::{PrivilegeDescriptor, PrivilegeGrant, PrivilegeSet, ADMIN_ROLE, ROOT_USER};
