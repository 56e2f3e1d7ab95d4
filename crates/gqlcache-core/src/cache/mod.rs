//! # Normalized Caches
//!
//! Backends holding the record store behind a common trait. The store
//! (`crate::store`) wraps one in a lock and only touches it inside
//! transactions.
//!
//! - [`InMemoryNormalizedCache`]: a `RecordSet` plus insertion order.
//! - [`PersistentNormalizedCache`]: rows encoded in the field format and
//!   kept by a [`PersistenceAdapter`](crate::storage::PersistenceAdapter).

pub mod memory;
pub mod persistent;

pub use memory::InMemoryNormalizedCache;
pub use persistent::PersistentNormalizedCache;

use crate::record_set::RecordSet;
use crate::storage::RedbRecordDatabase;
use crate::types::{CacheError, CacheKey, RecordRow, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// =============================================================================
// CLEARING POLICY
// =============================================================================

/// Which records a clear removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheClearingPolicy {
    AllRecords,
    /// Exactly this record key.
    Key(CacheKey),
    /// Keys matching a case-insensitive pattern (`*` wildcards).
    MatchingPattern(String),
    /// Records last received strictly before this time.
    OlderThan(Timestamp),
    /// The `n` oldest inserted records.
    FirstInserted(usize),
    /// The `n` most recently inserted records.
    LastInserted(usize),
}

// =============================================================================
// TRAIT
// =============================================================================

/// A keyed record store.
///
/// Changed keys returned by `merge` are field keys (`<recordKey>.<field>`).
pub trait NormalizedCache: Send + Sync {
    /// Rows for the given keys. Absent keys are not in the result.
    fn load_records(&self, keys: &BTreeSet<CacheKey>) -> Result<BTreeMap<CacheKey, RecordRow>, CacheError>;

    /// Merge `records`, returning the changed field keys.
    fn merge(&mut self, records: RecordSet) -> Result<BTreeSet<CacheKey>, CacheError>;

    /// Returns whether the record existed.
    fn remove_record(&mut self, key: &str) -> Result<bool, CacheError>;

    /// Returns the keys of the records removed.
    fn remove_records_matching(&mut self, pattern: &str) -> Result<Vec<CacheKey>, CacheError>;

    /// Remove what `policy` names, then optionally compact storage.
    fn clear(&mut self, policy: &CacheClearingPolicy, compact: bool) -> Result<(), CacheError>;

    /// Every row, in insertion order.
    fn load_all(&self) -> Result<Vec<RecordRow>, CacheError>;

    /// Seed rows in order, replacing any existing row with the same key.
    /// Timestamps are kept as given.
    fn import_rows(&mut self, rows: Vec<RecordRow>) -> Result<(), CacheError>;
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// The backend a store runs on.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory records (fast, volatile).
    InMemory(InMemoryNormalizedCache),
    /// Records persisted with redb.
    Persistent(PersistentNormalizedCache<RedbRecordDatabase>),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(InMemoryNormalizedCache::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// The redb database handle cannot be shared between two backends.

impl StorageBackend {
    /// Open (and migrate) a redb-backed backend at `path`.
    pub fn open_redb(path: impl AsRef<Path>, vacuum_on_clear: bool) -> Result<Self, CacheError> {
        let database = RedbRecordDatabase::open(path)?;
        let cache = PersistentNormalizedCache::new(database)?.with_vacuum_on_clear(vacuum_on_clear);
        Ok(Self::Persistent(cache))
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    fn as_cache(&self) -> &dyn NormalizedCache {
        match self {
            Self::InMemory(cache) => cache,
            Self::Persistent(cache) => cache,
        }
    }

    fn as_cache_mut(&mut self) -> &mut dyn NormalizedCache {
        match self {
            Self::InMemory(cache) => cache,
            Self::Persistent(cache) => cache,
        }
    }
}

impl NormalizedCache for StorageBackend {
    fn load_records(&self, keys: &BTreeSet<CacheKey>) -> Result<BTreeMap<CacheKey, RecordRow>, CacheError> {
        self.as_cache().load_records(keys)
    }

    fn merge(&mut self, records: RecordSet) -> Result<BTreeSet<CacheKey>, CacheError> {
        self.as_cache_mut().merge(records)
    }

    fn remove_record(&mut self, key: &str) -> Result<bool, CacheError> {
        self.as_cache_mut().remove_record(key)
    }

    fn remove_records_matching(&mut self, pattern: &str) -> Result<Vec<CacheKey>, CacheError> {
        self.as_cache_mut().remove_records_matching(pattern)
    }

    fn clear(&mut self, policy: &CacheClearingPolicy, compact: bool) -> Result<(), CacheError> {
        self.as_cache_mut().clear(policy, compact)
    }

    fn load_all(&self) -> Result<Vec<RecordRow>, CacheError> {
        self.as_cache().load_all()
    }

    fn import_rows(&mut self, rows: Vec<RecordRow>) -> Result<(), CacheError> {
        self.as_cache_mut().import_rows(rows)
    }
}
