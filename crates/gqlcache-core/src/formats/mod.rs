//! # Formats
//!
//! Byte-level encodings: the per-record field format stored by persistent
//! backends, and the whole-store snapshot format.
//!
//! File I/O lives with the callers; everything here is a pure transformation.

pub mod fields;
pub mod snapshot;

pub use fields::{deserialize_fields, serialize_fields};
pub use snapshot::{SnapshotHeader, rows_from_bytes, rows_to_bytes};
