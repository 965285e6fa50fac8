//! Identity types for TESSERA catalog objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 fingerprint of an encoded descriptor, used to detect whether a
/// rewrite pass actually changed anything.
pub type DescriptorFingerprint = [u8; 32];

/// Identifier of a catalog object (table, database, schema, sequence, type).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct DescriptorId(pub u32);

impl DescriptorId {
    /// The zero id, never assigned to a real object.
    pub const INVALID: DescriptorId = DescriptorId(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an index within a table descriptor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct IndexId(pub u32);

impl IndexId {
    pub fn next(&self) -> IndexId {
        IndexId(self.0 + 1)
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a column within a table descriptor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ColumnId(pub u32);

impl ColumnId {
    pub fn next(&self) -> ColumnId {
        ColumnId(self.0 + 1)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an asynchronous schema-change job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing version of a persisted descriptor.
///
/// Every committed change increments the version by exactly one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct DescriptorVersion(pub u64);

impl DescriptorVersion {
    /// Version assigned to a descriptor that has never been persisted before.
    pub const INITIAL: DescriptorVersion = DescriptorVersion(1);

    pub fn next(&self) -> DescriptorVersion {
        DescriptorVersion(self.0 + 1)
    }
}

impl fmt::Display for DescriptorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical storage identity of a table.
///
/// Truncation replaces the generation rather than deleting rows; readers of
/// the new generation observe zero rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageGeneration(pub Uuid);

impl StorageGeneration {
    /// Allocate a fresh generation (UUIDv7, timestamp-sortable).
    pub fn new() -> StorageGeneration {
        StorageGeneration(Uuid::now_v7())
    }
}

impl Default for StorageGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StorageGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the transaction a statement runs inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(pub Uuid);

impl TxnId {
    pub fn new() -> TxnId {
        TxnId(Uuid::now_v7())
    }
}

impl Default for TxnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the SHA-256 fingerprint of an encoded descriptor.
pub fn descriptor_fingerprint(bytes: &[u8]) -> DescriptorFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_version_increments_by_one() {
        let v = DescriptorVersion::INITIAL;
        assert_eq!(v.next(), DescriptorVersion(2));
        assert_eq!(v.next().next(), DescriptorVersion(3));
    }

    #[test]
    fn test_invalid_descriptor_id() {
        assert!(!DescriptorId::INVALID.is_valid());
        assert!(DescriptorId(52).is_valid());
    }

    #[test]
    fn test_storage_generations_are_distinct() {
        let a = StorageGeneration::new();
        let b = StorageGeneration::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let bytes = b"descriptor payload";
        assert_eq!(descriptor_fingerprint(bytes), descriptor_fingerprint(bytes));
        assert_ne!(
            descriptor_fingerprint(bytes),
            descriptor_fingerprint(b"other payload")
        );
    }
}
