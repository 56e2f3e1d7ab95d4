//! # Record Set
//!
//! The keyed collection of record rows: the store's logical content and the
//! unit of exchange between normalization, merge and persistence.

use crate::cache_key::matches_key_pattern;
use crate::merge::MergeEngine;
use crate::types::{CacheKey, Fields, Record, RecordRow, Timestamp};
use std::collections::{BTreeMap, BTreeSet};

/// Mapping from cache key to record row. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    storage: BTreeMap<CacheKey, RecordRow>,
}

impl RecordSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from rows. A later row with the same key replaces an earlier one.
    #[must_use]
    pub fn from_rows(rows: impl IntoIterator<Item = RecordRow>) -> Self {
        let mut set = Self::new();
        set.insert_all(rows);
        set
    }

    /// Build from records that all arrived at `received_at`.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = Record>, received_at: Timestamp) -> Self {
        Self::from_rows(
            records
                .into_iter()
                .map(|record| RecordRow::new(record, received_at)),
        )
    }

    /// Insert or replace a row, returning the replaced one.
    pub fn insert(&mut self, row: RecordRow) -> Option<RecordRow> {
        self.storage.insert(row.record.key.clone(), row)
    }

    pub fn insert_all(&mut self, rows: impl IntoIterator<Item = RecordRow>) {
        for row in rows {
            self.insert(row);
        }
    }

    /// Fields of the record at `key`, created empty if absent.
    ///
    /// New rows are stamped with `received_at`.
    pub fn fields_mut(&mut self, key: &str, received_at: Timestamp) -> &mut Fields {
        &mut self
            .storage
            .entry(key.to_string())
            .or_insert_with(|| RecordRow::new(Record::new(key, Fields::new()), received_at))
            .record
            .fields
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RecordRow> {
        self.storage.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut RecordRow> {
        self.storage.get_mut(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.storage.contains_key(key)
    }

    pub fn remove_record(&mut self, key: &str) -> Option<RecordRow> {
        self.storage.remove(key)
    }

    /// Remove every record whose key matches `pattern` (case-insensitive,
    /// `*` wildcards). Returns the removed keys.
    pub fn remove_records_matching(&mut self, pattern: &str) -> Vec<CacheKey> {
        let removed: Vec<CacheKey> = self
            .storage
            .keys()
            .filter(|key| matches_key_pattern(key, pattern))
            .cloned()
            .collect();
        for key in &removed {
            self.storage.remove(key);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.storage.clear();
    }

    /// Merge `other` in, stamping changed rows with the current time.
    pub fn merge(&mut self, other: Self) -> BTreeSet<CacheKey> {
        self.merge_at(other, Timestamp::now())
    }

    /// Merge `other` in, stamping changed rows with `now`.
    pub fn merge_at(&mut self, other: Self, now: Timestamp) -> BTreeSet<CacheKey> {
        MergeEngine::merge_at(self, other, now)
    }

    /// Merge a single record received at `received_at`.
    pub fn merge_record(&mut self, record: Record, received_at: Timestamp) -> BTreeSet<CacheKey> {
        MergeEngine::merge_row_at(self, RecordRow::new(record, received_at), received_at)
    }

    #[must_use]
    pub fn keys(&self) -> BTreeSet<CacheKey> {
        self.storage.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordRow> {
        self.storage.values()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<RecordRow> {
        self.storage.into_values().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

impl FromIterator<RecordRow> for RecordSet {
    fn from_iter<I: IntoIterator<Item = RecordRow>>(iter: I) -> Self {
        Self::from_rows(iter)
    }
}

// =============================================================================
// TESTS
// =============================================================================
