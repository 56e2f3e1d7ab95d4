//! # Persistent Normalized Cache
//!
//! Records kept by a [`PersistenceAdapter`], encoded in the field format.
//!
//! Merges read the affected rows, merge them in memory, then write back
//! only the records that own a changed field key. The adapter's schema is
//! migrated when the cache is constructed; a failed migration fails
//! construction.

use super::{CacheClearingPolicy, NormalizedCache};
use crate::cache_key::record_key_of;
use crate::formats::{deserialize_fields, serialize_fields};
use crate::record_set::RecordSet;
use crate::storage::{DatabaseRow, InsertionEnd, PersistenceAdapter};
use crate::types::{CacheError, CacheKey, Record, RecordRow, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Debug)]
pub struct PersistentNormalizedCache<A> {
    adapter: A,
    /// Compact storage after every clear.
    vacuum_on_clear: bool,
}

fn decode_row(row: DatabaseRow) -> Result<RecordRow, CacheError> {
    let fields = deserialize_fields(&row.key, &row.serialized_fields)?;
    Ok(RecordRow::new(
        Record::new(row.key, fields),
        Timestamp::from_secs(row.last_received_at),
    ))
}

fn encode_row(row: &RecordRow) -> Result<DatabaseRow, CacheError> {
    Ok(DatabaseRow {
        key: row.record.key.clone(),
        serialized_fields: serialize_fields(&row.record.key, &row.record.fields)?,
        last_received_at: row.last_received_at.secs(),
    })
}

impl<A: PersistenceAdapter> PersistentNormalizedCache<A> {
    /// Wrap `adapter`, migrating its schema first.
    pub fn new(mut adapter: A) -> Result<Self, CacheError> {
        let from = adapter.read_schema_version()?;
        let to = adapter.migrate()?;
        info!(from = ?from, to, "persistent cache ready");
        Ok(Self {
            adapter,
            vacuum_on_clear: false,
        })
    }

    /// Wrap `adapter` and seed it with `initial_records`.
    pub fn with_initial_records(adapter: A, initial_records: RecordSet) -> Result<Self, CacheError> {
        let mut cache = Self::new(adapter)?;
        cache.import_rows(initial_records.into_rows())?;
        Ok(cache)
    }

    #[must_use]
    pub const fn with_vacuum_on_clear(mut self, vacuum_on_clear: bool) -> Self {
        self.vacuum_on_clear = vacuum_on_clear;
        self
    }

    #[must_use]
    pub const fn adapter(&self) -> &A {
        &self.adapter
    }
}

impl<A: PersistenceAdapter> NormalizedCache for PersistentNormalizedCache<A> {
    fn load_records(&self, keys: &BTreeSet<CacheKey>) -> Result<BTreeMap<CacheKey, RecordRow>, CacheError> {
        self.adapter
            .select_rows(keys)?
            .into_iter()
            .map(|row| decode_row(row).map(|row| (row.record.key.clone(), row)))
            .collect()
    }

    fn merge(&mut self, records: RecordSet) -> Result<BTreeSet<CacheKey>, CacheError> {
        let keys = records.keys();
        let mut merged = RecordSet::from_rows(self.load_records(&keys)?.into_values());
        let changed = merged.merge_at(records, Timestamp::now());

        let owners: BTreeSet<CacheKey> = changed.iter().map(|key| record_key_of(key)).collect();
        let rows = owners
            .iter()
            .filter_map(|key| merged.get(key))
            .map(encode_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.adapter.upsert(&rows)?;

        debug!(
            records = keys.len(),
            written = rows.len(),
            changed = changed.len(),
            "merged records into persistent cache"
        );
        Ok(changed)
    }

    fn remove_record(&mut self, key: &str) -> Result<bool, CacheError> {
        self.adapter.delete_exact(key)
    }

    fn remove_records_matching(&mut self, pattern: &str) -> Result<Vec<CacheKey>, CacheError> {
        self.adapter.delete_matching(pattern)
    }

    fn clear(&mut self, policy: &CacheClearingPolicy, compact: bool) -> Result<(), CacheError> {
        let compact = compact || self.vacuum_on_clear;
        let removed = match policy {
            CacheClearingPolicy::AllRecords => {
                self.adapter.clear(compact)?;
                debug!(?policy, compact, "cleared persistent records");
                return Ok(());
            }
            CacheClearingPolicy::Key(key) => usize::from(self.adapter.delete_exact(key)?),
            CacheClearingPolicy::MatchingPattern(pattern) => self.adapter.delete_matching(pattern)?.len(),
            CacheClearingPolicy::OlderThan(before) => {
                self.adapter.delete_received_before(before.secs())?
            }
            CacheClearingPolicy::FirstInserted(count) => self
                .adapter
                .delete_by_insertion_order(InsertionEnd::First, *count)?,
            CacheClearingPolicy::LastInserted(count) => self
                .adapter
                .delete_by_insertion_order(InsertionEnd::Last, *count)?,
        };
        if compact {
            self.adapter.compact()?;
        }
        debug!(?policy, removed, compact, "cleared persistent records");
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<RecordRow>, CacheError> {
        self.adapter
            .select_all()?
            .into_iter()
            .map(decode_row)
            .collect()
    }

    fn import_rows(&mut self, rows: Vec<RecordRow>) -> Result<(), CacheError> {
        let rows = rows.iter().map(encode_row).collect::<Result<Vec<_>, _>>()?;
        self.adapter.upsert(&rows)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RedbRecordDatabase;
    use crate::types::{CacheReference, FieldValue, Fields};
    use tempfile::tempdir;

    fn open(path: &std::path::Path) -> PersistentNormalizedCache<RedbRecordDatabase> {
        PersistentNormalizedCache::new(RedbRecordDatabase::open(path).expect("open db"))
            .expect("migrate")
    }

    fn keys(list: &[&str]) -> BTreeSet<CacheKey> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn merge_writes_only_changed_records() {
        let temp = tempdir().expect("temp dir");
        let mut cache = open(&temp.path().join("cache.redb"));

        let records = RecordSet::from_records(
            [
                Record::new("QUERY_ROOT", Fields::new())
                    .with_field("hero", CacheReference::new("QUERY_ROOT.hero")),
                Record::new("QUERY_ROOT.hero", Fields::new())
                    .with_field("name", "R2-D2")
                    .with_field(
                        "friends",
                        FieldValue::List(vec![CacheReference::new("QUERY_ROOT.hero.friends.0").into()]),
                    ),
                Record::new("QUERY_ROOT.hero.friends.0", Fields::new()).with_field("name", "Luke"),
            ],
            Timestamp(100),
        );
        assert_eq!(cache.merge(records.clone()).expect("merge").len(), 4);
        assert!(cache.merge(records).expect("merge").is_empty());

        let update = RecordSet::from_records(
            [Record::new("QUERY_ROOT.hero.friends.0", Fields::new()).with_field("name", "Han")],
            Timestamp(200),
        );
        let changed = cache.merge(update).expect("merge");
        assert_eq!(changed, keys(&["QUERY_ROOT.hero.friends.0.name"]));

        let loaded = cache
            .load_records(&keys(&["QUERY_ROOT.hero.friends.0", "QUERY_ROOT.hero"]))
            .expect("load");
        assert_eq!(
            loaded["QUERY_ROOT.hero.friends.0"].record.get("name"),
            Some(&FieldValue::from("Han"))
        );
        assert_eq!(loaded["QUERY_ROOT.hero"].last_received_at, Timestamp(100));
        assert!(loaded["QUERY_ROOT.hero.friends.0"].last_received_at > Timestamp(100));
    }

    #[test]
    fn survives_reopen_with_timestamps() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("cache.redb");
        {
            let mut cache = open(&path);
            cache
                .import_rows(vec![RecordRow::new(
                    Record::new("2001", Fields::new()).with_field("height", FieldValue::Float(0.96)),
                    Timestamp(42),
                )])
                .expect("import");
        }

        let cache = open(&path);
        let all = cache.load_all().expect("all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].last_received_at, Timestamp(42));
        assert_eq!(all[0].record.get("height"), Some(&FieldValue::Float(0.96)));
    }

    #[test]
    fn initial_records_are_imported() {
        let temp = tempdir().expect("temp dir");
        let seed = RecordSet::from_records(
            [Record::new("QUERY_ROOT", Fields::new()).with_field("greeting", "hi")],
            Timestamp(7),
        );
        let cache = PersistentNormalizedCache::with_initial_records(
            RedbRecordDatabase::open(temp.path().join("cache.redb")).expect("open db"),
            seed,
        )
        .expect("seed");
        assert_eq!(cache.load_all().expect("all").len(), 1);
        assert_eq!(
            cache.adapter().read_schema_version().expect("version"),
            Some(crate::primitives::SCHEMA_VERSION)
        );
    }

    #[test]
    fn clear_with_vacuum() {
        let temp = tempdir().expect("temp dir");
        let mut cache = open(&temp.path().join("cache.redb")).with_vacuum_on_clear(true);
        cache
            .merge(RecordSet::from_records(
                [
                    Record::new("Human:1000", Fields::new()).with_field("name", "Luke"),
                    Record::new("Human:1002", Fields::new()).with_field("name", "Han"),
                ],
                Timestamp(1),
            ))
            .expect("merge");

        cache
            .clear(&CacheClearingPolicy::MatchingPattern("*1002".to_string()), false)
            .expect("clear");
        assert_eq!(cache.load_all().expect("all").len(), 1);

        cache.clear(&CacheClearingPolicy::AllRecords, false).expect("clear");
        assert!(cache.load_all().expect("all").is_empty());
    }
}
