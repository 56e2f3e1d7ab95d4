//! # Primitives
//!
//! Fixed constants of the cache: root keys, field-format markers, and the
//! binary snapshot and store schema versions.

// =============================================================================
// ROOT KEYS
// =============================================================================

/// Substring that marks an operation root key.
///
/// Field keys whose first segment contains this marker keep list-index
/// segments attached to their parent field when mapped to a record key.
pub const ROOT_MARKER: &str = "_ROOT";

/// Record key of the query root object.
pub const QUERY_ROOT: &str = "QUERY_ROOT";

/// Record key of the mutation root object.
pub const MUTATION_ROOT: &str = "MUTATION_ROOT";

/// Record key of the subscription root object.
pub const SUBSCRIPTION_ROOT: &str = "SUBSCRIPTION_ROOT";

/// Field every object carries to name its concrete type.
pub const TYPENAME_FIELD: &str = "__typename";

// =============================================================================
// FIELD FORMAT
// =============================================================================

/// JSON key marking a serialized `CacheReference`: `{"$reference": "<key>"}`.
pub const REFERENCE_MARKER: &str = "$reference";

/// JSON key wrapping a stored object whose own shape would be ambiguous
/// with a marker: `{"$object": {...}}`.
pub const OBJECT_MARKER: &str = "$object";

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Magic bytes for the record-set snapshot header.
///
/// - File Header = Magic Bytes ("GQLC") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"GQLC";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum snapshot size accepted for import (256 MB).
///
/// Validated before any payload decoding.
pub const MAX_SNAPSHOT_SIZE: usize = 256 * 1024 * 1024;

// =============================================================================
// STORE SCHEMA
// =============================================================================

/// Schema version the persistent backend migrates to on open.
///
/// - v1: every row has a received-at timestamp (legacy rows backfilled with 0)
/// - v2: every row has an insertion sequence number
pub const SCHEMA_VERSION: u64 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_keys_carry_root_marker() {
        for key in [QUERY_ROOT, MUTATION_ROOT, SUBSCRIPTION_ROOT] {
            assert!(key.contains(ROOT_MARKER), "{key} lacks the root marker");
        }
    }

    #[test]
    fn markers_are_distinct() {
        assert_ne!(REFERENCE_MARKER, OBJECT_MARKER);
        assert!(REFERENCE_MARKER.starts_with('$'));
    }
}
