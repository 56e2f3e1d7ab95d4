//! # In-Memory Normalized Cache
//!
//! A `RecordSet` plus a sequence number per record. A record gets a new
//! sequence number whenever it is inserted or one of its fields changes,
//! which is what `FirstInserted` / `LastInserted` clearing walks.

use super::{CacheClearingPolicy, NormalizedCache};
use crate::merge::MergeEngine;
use crate::record_set::RecordSet;
use crate::types::{CacheError, CacheKey, RecordRow, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Default)]
pub struct InMemoryNormalizedCache {
    records: RecordSet,
    /// Sequence -> key, oldest first.
    insertion_order: BTreeMap<u64, CacheKey>,
    /// Key -> current sequence.
    sequence_of: BTreeMap<CacheKey, u64>,
    next_seq: u64,
}

impl InMemoryNormalizedCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache seeded with `records`, in key order.
    #[must_use]
    pub fn with_records(records: RecordSet) -> Self {
        let mut cache = Self::new();
        for row in records.into_rows() {
            cache.touch(row.key());
            cache.records.insert(row);
        }
        cache
    }

    /// The current record set.
    #[must_use]
    pub const fn records(&self) -> &RecordSet {
        &self.records
    }

    fn touch(&mut self, key: &str) {
        if let Some(previous) = self.sequence_of.insert(key.to_string(), self.next_seq) {
            self.insertion_order.remove(&previous);
        }
        self.insertion_order.insert(self.next_seq, key.to_string());
        self.next_seq += 1;
    }

    fn forget(&mut self, key: &str) -> bool {
        if let Some(sequence) = self.sequence_of.remove(key) {
            self.insertion_order.remove(&sequence);
        }
        self.records.remove_record(key).is_some()
    }

    fn remove_keys(&mut self, keys: Vec<CacheKey>) -> usize {
        keys.into_iter().filter(|key| self.forget(key)).count()
    }
}

impl NormalizedCache for InMemoryNormalizedCache {
    fn load_records(&self, keys: &BTreeSet<CacheKey>) -> Result<BTreeMap<CacheKey, RecordRow>, CacheError> {
        Ok(keys
            .iter()
            .filter_map(|key| self.records.get(key).map(|row| (key.clone(), row.clone())))
            .collect())
    }

    fn merge(&mut self, records: RecordSet) -> Result<BTreeSet<CacheKey>, CacheError> {
        let now = Timestamp::now();
        let incoming = records.len();
        let mut changed = BTreeSet::new();

        for row in records.into_rows() {
            let key = row.key().to_string();
            let mut row_changes = MergeEngine::merge_row_at(&mut self.records, row, now);
            if !row_changes.is_empty() {
                self.touch(&key);
            }
            changed.append(&mut row_changes);
        }

        debug!(records = incoming, changed = changed.len(), "merged records into memory");
        Ok(changed)
    }

    fn remove_record(&mut self, key: &str) -> Result<bool, CacheError> {
        Ok(self.forget(key))
    }

    fn remove_records_matching(&mut self, pattern: &str) -> Result<Vec<CacheKey>, CacheError> {
        let keys = self.records.remove_records_matching(pattern);
        for key in &keys {
            self.forget(key);
        }
        Ok(keys)
    }

    fn clear(&mut self, policy: &CacheClearingPolicy, _compact: bool) -> Result<(), CacheError> {
        let removed = match policy {
            CacheClearingPolicy::AllRecords => {
                let count = self.records.len();
                self.records.clear();
                self.insertion_order.clear();
                self.sequence_of.clear();
                count
            }
            CacheClearingPolicy::Key(key) => usize::from(self.forget(key)),
            CacheClearingPolicy::MatchingPattern(pattern) => self.remove_records_matching(pattern)?.len(),
            CacheClearingPolicy::OlderThan(before) => {
                let keys = self
                    .records
                    .iter()
                    .filter(|row| row.last_received_at < *before)
                    .map(|row| row.record.key.clone())
                    .collect();
                self.remove_keys(keys)
            }
            CacheClearingPolicy::FirstInserted(count) => {
                let keys = self.insertion_order.values().take(*count).cloned().collect();
                self.remove_keys(keys)
            }
            CacheClearingPolicy::LastInserted(count) => {
                let keys = self.insertion_order.values().rev().take(*count).cloned().collect();
                self.remove_keys(keys)
            }
        };
        debug!(?policy, removed, "cleared in-memory records");
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<RecordRow>, CacheError> {
        Ok(self
            .insertion_order
            .values()
            .filter_map(|key| self.records.get(key).cloned())
            .collect())
    }

    fn import_rows(&mut self, rows: Vec<RecordRow>) -> Result<(), CacheError> {
        for row in rows {
            self.touch(row.key());
            self.records.insert(row);
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
