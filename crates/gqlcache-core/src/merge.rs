//! # Merge Engine
//!
//! Reconciles an incoming record set with a stored one.
//!
//! A field is written only when its new value differs from the stored one
//! (structural equality, references compared by key). The row's
//! `last_received_at` moves only when at least one field actually changed,
//! which is what lets freshness queries tell untouched data from refreshed
//! data.

use crate::cache_key::field_key;
use crate::record_set::RecordSet;
use crate::types::{CacheKey, Record, RecordRow, Timestamp};
use std::collections::BTreeSet;

/// Stateless merge rules.
pub struct MergeEngine;

impl MergeEngine {
    /// Merge every row of `incoming` into `store`.
    ///
    /// Returns the union of changed field keys (`<recordKey>.<field>`).
    /// `now` stamps rows that existed and changed; new rows keep the
    /// timestamp they arrived with.
    pub fn merge_at(store: &mut RecordSet, incoming: RecordSet, now: Timestamp) -> BTreeSet<CacheKey> {
        let mut changed = BTreeSet::new();
        for row in incoming.into_rows() {
            changed.append(&mut Self::merge_row_at(store, row, now));
        }
        changed
    }

    /// Merge a single row into `store`.
    pub fn merge_row_at(store: &mut RecordSet, incoming: RecordRow, now: Timestamp) -> BTreeSet<CacheKey> {
        let RecordRow {
            record,
            last_received_at,
        } = incoming;

        let Some(existing) = store.get_mut(&record.key) else {
            let changed = Self::all_field_keys(&record);
            store.insert(RecordRow::new(record, last_received_at));
            return changed;
        };

        let mut changed = BTreeSet::new();
        for (field, value) in record.fields {
            if existing.record.get(&field) == Some(&value) {
                continue;
            }
            changed.insert(field_key(&record.key, &field));
            existing.record.insert(field, value);
        }

        if !changed.is_empty() {
            existing.last_received_at = now;
        }
        changed
    }

    fn all_field_keys(record: &Record) -> BTreeSet<CacheKey> {
        record
            .fields
            .keys()
            .map(|field| field_key(&record.key, field))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
