//! Versioned descriptor encoding.
//!
//! Descriptors are persisted as a versioned envelope around a tagged
//! payload. Encoding is deterministic: identical logical input yields
//! identical bytes, no matter how many times fixups are reapplied.

use serde::{Deserialize, Serialize};
use tessera_core::{
    CatalogResult, DatabaseDescriptor, DecodeError, DescriptorId, DescriptorType,
    DescriptorVersion, TableDescriptor,
};

/// Current descriptor format version. Decoding accepts anything up to and
/// including this.
pub const FORMAT_VERSION: u32 = 1;

/// The payload of a persisted descriptor record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescriptorPayload {
    Table(TableDescriptor),
    Database(DatabaseDescriptor),
}

impl DescriptorPayload {
    pub fn descriptor_type(&self) -> DescriptorType {
        match self {
            DescriptorPayload::Table(_) => DescriptorType::Table,
            DescriptorPayload::Database(_) => DescriptorType::Database,
        }
    }

    pub fn id(&self) -> DescriptorId {
        match self {
            DescriptorPayload::Table(t) => t.id,
            DescriptorPayload::Database(d) => d.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DescriptorPayload::Table(t) => &t.name,
            DescriptorPayload::Database(d) => &d.name,
        }
    }

    pub fn version(&self) -> DescriptorVersion {
        match self {
            DescriptorPayload::Table(t) => t.version,
            DescriptorPayload::Database(d) => d.version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DescriptorEnvelope {
    format_version: u32,
    descriptor: DescriptorPayload,
}

/// Encode a descriptor payload into its persisted byte form.
pub fn encode(payload: &DescriptorPayload) -> CatalogResult<Vec<u8>> {
    let envelope = DescriptorEnvelope {
        format_version: FORMAT_VERSION,
        descriptor: payload.clone(),
    };
    serde_json::to_vec(&envelope).map_err(|e| {
        DecodeError::Malformed {
            reason: format!("re-encode failed: {e}"),
        }
        .into()
    })
}

/// Decode persisted bytes into a descriptor payload. Malformed input is a
/// fatal corruption-class error, never retried.
pub fn decode(bytes: &[u8]) -> CatalogResult<DescriptorPayload> {
    let envelope: DescriptorEnvelope =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed {
            reason: e.to_string(),
        })?;
    if envelope.format_version > FORMAT_VERSION {
        return Err(DecodeError::UnsupportedFormatVersion {
            found: envelope.format_version,
            max: FORMAT_VERSION,
        }
        .into());
    }
    Ok(envelope.descriptor)
}

pub fn encode_table(table: &TableDescriptor) -> CatalogResult<Vec<u8>> {
    encode(&DescriptorPayload::Table(table.clone()))
}

pub fn encode_database(database: &DatabaseDescriptor) -> CatalogResult<Vec<u8>> {
    encode(&DescriptorPayload::Database(database.clone()))
}

pub fn decode_table(bytes: &[u8]) -> CatalogResult<TableDescriptor> {
    match decode(bytes)? {
        DescriptorPayload::Table(t) => Ok(t),
        other => Err(DecodeError::WrongDescriptorType {
            expected: DescriptorType::Table,
            found: other.descriptor_type(),
        }
        .into()),
    }
}

pub fn decode_database(bytes: &[u8]) -> CatalogResult<DatabaseDescriptor> {
    match decode(bytes)? {
        DescriptorPayload::Database(d) => Ok(d),
        other => Err(DecodeError::WrongDescriptorType {
            expected: DescriptorType::Database,
            found: other.descriptor_type(),
        }
        .into()),
    }
}
