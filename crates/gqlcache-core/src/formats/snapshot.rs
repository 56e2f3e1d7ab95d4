//! # Snapshot Format
//!
//! Binary export and import of a whole record set, used to preload stores
//! and move cache contents between backends.
//!
//! Format: Header (5 bytes) + postcard-serialized rows.
//! - 4 bytes: Magic ("GQLC")
//! - 1 byte: Version
//!
//! Rows keep their order, so a store seeded from a snapshot sees the same
//! insertion order as the store it was taken from.
//!
//! The total size is validated against `MAX_SNAPSHOT_SIZE` and the header is
//! checked before any payload decoding.

use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES, MAX_SNAPSHOT_SIZE};
use crate::types::{CacheError, RecordRow};

/// Header length in bytes.
const HEADER_LEN: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The header preceding every snapshot payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if &self.magic != MAGIC_BYTES {
            return Err(CacheError::Serialization("Invalid magic bytes".to_string()));
        }
        if self.version != FORMAT_VERSION {
            return Err(CacheError::Serialization(format!(
                "Unsupported snapshot version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
        let Some(header) = bytes.get(..HEADER_LEN) else {
            return Err(CacheError::Serialization("Header too short".to_string()));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode rows as a snapshot (header + payload).
pub fn rows_to_bytes(rows: &[RecordRow]) -> Result<Vec<u8>, CacheError> {
    let payload =
        postcard::to_stdvec(rows).map_err(|e| CacheError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&SnapshotHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a snapshot, validating size and header first.
pub fn rows_from_bytes(bytes: &[u8]) -> Result<Vec<RecordRow>, CacheError> {
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(CacheError::Serialization(format!(
            "Snapshot size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
        CacheError::Serialization(format!("Failed to deserialize snapshot rows: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CacheReference, FieldValue, Fields, Record, Timestamp};

    fn rows() -> Vec<RecordRow> {
        vec![
            RecordRow::new(
                Record::new("QUERY_ROOT", Fields::new())
                    .with_field("hero", CacheReference::new("2001")),
                Timestamp(10),
            ),
            RecordRow::new(
                Record::new("2001", Fields::new())
                    .with_field("name", "R2-D2")
                    .with_field("height", FieldValue::Float(0.96)),
                Timestamp(20),
            ),
        ]
    }

    #[test]
    fn header_roundtrip() {
        let header = SnapshotHeader::new();
        let restored = SnapshotHeader::from_bytes(&header.to_bytes()).expect("parse header");
        assert_eq!(restored, header);
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn rows_roundtrip_in_order() {
        let bytes = rows_to_bytes(&rows()).expect("encode");
        assert_eq!(&bytes[0..4], MAGIC_BYTES);
        assert_eq!(rows_from_bytes(&bytes).expect("decode"), rows());
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(
            rows_to_bytes(&rows()).expect("encode"),
            rows_to_bytes(&rows()).expect("encode")
        );
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let mut bytes = rows_to_bytes(&rows()).expect("encode");
        bytes[0] = b'X';
        assert!(rows_from_bytes(&bytes).is_err());

        let mut bytes = rows_to_bytes(&rows()).expect("encode");
        bytes[4] = FORMAT_VERSION + 1;
        assert!(rows_from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_truncated_data() {
        assert!(rows_from_bytes(&[]).is_err());
        assert!(rows_from_bytes(b"GQL").is_err());

        let bytes = rows_to_bytes(&rows()).expect("encode");
        assert!(rows_from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }
}
