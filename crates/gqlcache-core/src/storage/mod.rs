//! # Persistence Adapter Contract
//!
//! What a durable backend must provide for the persistent normalized cache.
//! Rows travel as raw strings here; the cache layer owns the field format.
//!
//! ## Migrations
//!
//! Backends carry a monotonically increasing schema version. `migrate`
//! applies ordered, idempotent steps: each step checks the stored version,
//! applies only if behind, then advances the version. Running it any number
//! of times from any intermediate version converges on the same schema.

pub mod redb_records;

pub use redb_records::RedbRecordDatabase;

use crate::types::{CacheError, CacheKey};
use std::collections::BTreeSet;

/// A stored row in its raw form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRow {
    pub key: CacheKey,
    /// Fields in the JSON field format (see `formats::fields`).
    pub serialized_fields: String,
    /// Seconds since the Unix epoch.
    pub last_received_at: i64,
}

/// Which end of the insertion order to evict from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionEnd {
    /// Oldest inserted rows first.
    First,
    /// Most recently inserted rows first.
    Last,
}

/// Durable row storage behind the persistent cache.
pub trait PersistenceAdapter: Send + Sync {
    /// Rows for the given keys. Absent keys are skipped.
    fn select_rows(&self, keys: &BTreeSet<CacheKey>) -> Result<Vec<DatabaseRow>, CacheError>;

    /// Every row, in insertion order.
    fn select_all(&self) -> Result<Vec<DatabaseRow>, CacheError>;

    /// Insert or replace rows. A replaced row counts as newly inserted.
    fn upsert(&mut self, rows: &[DatabaseRow]) -> Result<(), CacheError>;

    /// Returns whether the row existed.
    fn delete_exact(&mut self, key: &str) -> Result<bool, CacheError>;

    /// Delete rows whose key matches `pattern` (case-insensitive, `*`
    /// wildcards). Returns the deleted keys.
    fn delete_matching(&mut self, pattern: &str) -> Result<Vec<CacheKey>, CacheError>;

    /// Delete rows last received strictly before `before`.
    fn delete_received_before(&mut self, before: i64) -> Result<usize, CacheError>;

    /// Delete `count` rows from one end of the insertion order.
    fn delete_by_insertion_order(&mut self, end: InsertionEnd, count: usize) -> Result<usize, CacheError>;

    /// Delete every row, optionally compacting storage afterwards.
    fn clear(&mut self, vacuum: bool) -> Result<(), CacheError>;

    /// Compact storage.
    fn compact(&mut self) -> Result<(), CacheError>;

    /// Stored schema version; `None` for a store that was never versioned.
    fn read_schema_version(&self) -> Result<Option<u64>, CacheError>;

    /// Bring the schema to the current version. Returns the version reached.
    fn migrate(&mut self) -> Result<u64, CacheError>;
}
