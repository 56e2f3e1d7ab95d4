//! # redb-backed Record Storage
//!
//! A disk-backed `PersistenceAdapter` using the redb embedded database.
//!
//! Every write is a single ACID transaction. Insertion order is kept as a
//! monotonically increasing sequence number per row, indexed both ways so
//! eviction from either end is a range scan.
//!
//! ## Schema history
//!
//! - v0: `records` only
//! - v1: adds `received_at` (backfilled with 0)
//! - v2: adds the insertion sequence (backfilled in key order)

use super::{DatabaseRow, InsertionEnd, PersistenceAdapter};
use crate::cache_key::matches_key_pattern;
use crate::primitives::SCHEMA_VERSION;
use crate::types::{CacheError, CacheKey};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError, WriteTransaction};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Record key -> serialized fields
const RECORDS: TableDefinition<&str, &str> = TableDefinition::new("records");

/// Record key -> seconds since the Unix epoch
const RECEIVED_AT: TableDefinition<&str, i64> = TableDefinition::new("received_at");

/// Record key -> insertion sequence
const INSERTION_SEQ: TableDefinition<&str, u64> = TableDefinition::new("insertion_seq");

/// Insertion sequence -> record key
const INSERTION_ORDER: TableDefinition<u64, &str> = TableDefinition::new("insertion_order");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const SCHEMA_VERSION_KEY: &str = "schema_version";
const NEXT_SEQ_KEY: &str = "next_seq";

fn storage_error(e: impl std::fmt::Display) -> CacheError {
    CacheError::Storage(e.to_string())
}

// =============================================================================
// MIGRATIONS
// =============================================================================

struct Migration {
    version: u64,
    apply: fn(&WriteTransaction) -> Result<(), CacheError>,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        apply: backfill_received_at,
    },
    Migration {
        version: 2,
        apply: backfill_insertion_order,
    },
];

fn backfill_received_at(txn: &WriteTransaction) -> Result<(), CacheError> {
    let records = txn.open_table(RECORDS).map_err(storage_error)?;
    let mut received = txn.open_table(RECEIVED_AT).map_err(storage_error)?;

    let mut missing = Vec::new();
    for entry in records.iter().map_err(storage_error)? {
        let (key, _) = entry.map_err(storage_error)?;
        let key = key.value().to_string();
        if received.get(key.as_str()).map_err(storage_error)?.is_none() {
            missing.push(key);
        }
    }
    for key in &missing {
        received.insert(key.as_str(), 0i64).map_err(storage_error)?;
    }
    Ok(())
}

fn backfill_insertion_order(txn: &WriteTransaction) -> Result<(), CacheError> {
    let records = txn.open_table(RECORDS).map_err(storage_error)?;
    let mut sequence = txn.open_table(INSERTION_SEQ).map_err(storage_error)?;
    let mut order = txn.open_table(INSERTION_ORDER).map_err(storage_error)?;
    let mut metadata = txn.open_table(METADATA).map_err(storage_error)?;

    let mut next_seq = metadata
        .get(NEXT_SEQ_KEY)
        .map_err(storage_error)?
        .map(|v| v.value())
        .unwrap_or(0);

    let mut missing = Vec::new();
    for entry in records.iter().map_err(storage_error)? {
        let (key, _) = entry.map_err(storage_error)?;
        let key = key.value().to_string();
        if sequence.get(key.as_str()).map_err(storage_error)?.is_none() {
            missing.push(key);
        }
    }
    for key in &missing {
        sequence.insert(key.as_str(), next_seq).map_err(storage_error)?;
        order.insert(next_seq, key.as_str()).map_err(storage_error)?;
        next_seq += 1;
    }
    metadata.insert(NEXT_SEQ_KEY, next_seq).map_err(storage_error)?;
    Ok(())
}

// =============================================================================
// DATABASE
// =============================================================================

/// A disk-backed record store using redb.
pub struct RedbRecordDatabase {
    db: Database,
}

impl std::fmt::Debug for RedbRecordDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbRecordDatabase").finish_non_exhaustive()
    }
}

impl RedbRecordDatabase {
    /// Open or create a record database at the given path.
    ///
    /// The schema is not touched until `migrate` runs.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let db = Database::create(path.as_ref()).map_err(storage_error)?;
        debug!(path = %path.as_ref().display(), "opened record database");
        Ok(Self { db })
    }

    fn ensure_tables(&self) -> Result<(), CacheError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        {
            let _ = write_txn.open_table(RECORDS).map_err(storage_error)?;
            let _ = write_txn.open_table(RECEIVED_AT).map_err(storage_error)?;
            let _ = write_txn.open_table(INSERTION_SEQ).map_err(storage_error)?;
            let _ = write_txn.open_table(INSERTION_ORDER).map_err(storage_error)?;
            let _ = write_txn.open_table(METADATA).map_err(storage_error)?;
        }
        write_txn.commit().map_err(storage_error)
    }

    fn stored_version(txn: &WriteTransaction) -> Result<u64, CacheError> {
        let metadata = txn.open_table(METADATA).map_err(storage_error)?;
        let version = metadata
            .get(SCHEMA_VERSION_KEY)
            .map_err(storage_error)?
            .map(|v| v.value())
            .unwrap_or(0);
        Ok(version)
    }
}

/// Remove rows from every table. Returns how many records existed.
fn delete_keys(txn: &WriteTransaction, keys: &[CacheKey]) -> Result<usize, CacheError> {
    let mut records = txn.open_table(RECORDS).map_err(storage_error)?;
    let mut received = txn.open_table(RECEIVED_AT).map_err(storage_error)?;
    let mut sequence = txn.open_table(INSERTION_SEQ).map_err(storage_error)?;
    let mut order = txn.open_table(INSERTION_ORDER).map_err(storage_error)?;

    let mut deleted = 0;
    for key in keys {
        let existed = records.remove(key.as_str()).map_err(storage_error)?.is_some();
        received.remove(key.as_str()).map_err(storage_error)?;
        let seq = sequence
            .remove(key.as_str())
            .map_err(storage_error)?
            .map(|v| v.value());
        if let Some(seq) = seq {
            order.remove(seq).map_err(storage_error)?;
        }
        if existed {
            deleted += 1;
        }
    }
    Ok(deleted)
}

impl PersistenceAdapter for RedbRecordDatabase {
    fn select_rows(&self, keys: &BTreeSet<CacheKey>) -> Result<Vec<DatabaseRow>, CacheError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let records = read_txn.open_table(RECORDS).map_err(storage_error)?;
        let received = read_txn.open_table(RECEIVED_AT).map_err(storage_error)?;

        let mut rows = Vec::new();
        for key in keys {
            let serialized = records
                .get(key.as_str())
                .map_err(storage_error)?
                .map(|v| v.value().to_string());
            let Some(serialized_fields) = serialized else {
                continue;
            };
            let last_received_at = received
                .get(key.as_str())
                .map_err(storage_error)?
                .map(|v| v.value())
                .unwrap_or(0);
            rows.push(DatabaseRow {
                key: key.clone(),
                serialized_fields,
                last_received_at,
            });
        }
        Ok(rows)
    }

    fn select_all(&self) -> Result<Vec<DatabaseRow>, CacheError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let order = read_txn.open_table(INSERTION_ORDER).map_err(storage_error)?;

        let mut keys = Vec::new();
        for entry in order.iter().map_err(storage_error)? {
            let (_, key) = entry.map_err(storage_error)?;
            keys.push(key.value().to_string());
        }
        drop(order);

        let records = read_txn.open_table(RECORDS).map_err(storage_error)?;
        let received = read_txn.open_table(RECEIVED_AT).map_err(storage_error)?;
        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            let serialized = records
                .get(key.as_str())
                .map_err(storage_error)?
                .map(|v| v.value().to_string());
            let Some(serialized_fields) = serialized else {
                continue;
            };
            let last_received_at = received
                .get(key.as_str())
                .map_err(storage_error)?
                .map(|v| v.value())
                .unwrap_or(0);
            rows.push(DatabaseRow {
                key,
                serialized_fields,
                last_received_at,
            });
        }
        Ok(rows)
    }

    fn upsert(&mut self, rows: &[DatabaseRow]) -> Result<(), CacheError> {
        if rows.is_empty() {
            return Ok(());
        }

        let write_txn = self.db.begin_write().map_err(storage_error)?;
        {
            let mut records = write_txn.open_table(RECORDS).map_err(storage_error)?;
            let mut received = write_txn.open_table(RECEIVED_AT).map_err(storage_error)?;
            let mut sequence = write_txn.open_table(INSERTION_SEQ).map_err(storage_error)?;
            let mut order = write_txn.open_table(INSERTION_ORDER).map_err(storage_error)?;
            let mut metadata = write_txn.open_table(METADATA).map_err(storage_error)?;

            let mut next_seq = metadata
                .get(NEXT_SEQ_KEY)
                .map_err(storage_error)?
                .map(|v| v.value())
                .unwrap_or(0);

            for row in rows {
                let key = row.key.as_str();
                records
                    .insert(key, row.serialized_fields.as_str())
                    .map_err(storage_error)?;
                received
                    .insert(key, row.last_received_at)
                    .map_err(storage_error)?;

                let previous = sequence
                    .insert(key, next_seq)
                    .map_err(storage_error)?
                    .map(|v| v.value());
                if let Some(previous) = previous {
                    order.remove(previous).map_err(storage_error)?;
                }
                order.insert(next_seq, key).map_err(storage_error)?;
                next_seq += 1;
            }

            metadata
                .insert(NEXT_SEQ_KEY, next_seq)
                .map_err(storage_error)?;
        }
        write_txn.commit().map_err(storage_error)
    }

    fn delete_exact(&mut self, key: &str) -> Result<bool, CacheError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        let deleted = delete_keys(&write_txn, &[key.to_string()])?;
        write_txn.commit().map_err(storage_error)?;
        Ok(deleted > 0)
    }

    fn delete_matching(&mut self, pattern: &str) -> Result<Vec<CacheKey>, CacheError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        let keys = {
            let records = write_txn.open_table(RECORDS).map_err(storage_error)?;
            let mut keys = Vec::new();
            for entry in records.iter().map_err(storage_error)? {
                let (key, _) = entry.map_err(storage_error)?;
                if matches_key_pattern(key.value(), pattern) {
                    keys.push(key.value().to_string());
                }
            }
            keys
        };
        delete_keys(&write_txn, &keys)?;
        write_txn.commit().map_err(storage_error)?;
        Ok(keys)
    }

    fn delete_received_before(&mut self, before: i64) -> Result<usize, CacheError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        let keys = {
            let received = write_txn.open_table(RECEIVED_AT).map_err(storage_error)?;
            let mut keys = Vec::new();
            for entry in received.iter().map_err(storage_error)? {
                let (key, at) = entry.map_err(storage_error)?;
                if at.value() < before {
                    keys.push(key.value().to_string());
                }
            }
            keys
        };
        let deleted = delete_keys(&write_txn, &keys)?;
        write_txn.commit().map_err(storage_error)?;
        Ok(deleted)
    }

    fn delete_by_insertion_order(&mut self, end: InsertionEnd, count: usize) -> Result<usize, CacheError> {
        if count == 0 {
            return Ok(0);
        }

        let write_txn = self.db.begin_write().map_err(storage_error)?;
        let keys = {
            let order = write_txn.open_table(INSERTION_ORDER).map_err(storage_error)?;
            let range = order.iter().map_err(storage_error)?;
            let entries: Vec<_> = match end {
                InsertionEnd::First => range.take(count).collect(),
                InsertionEnd::Last => range.rev().take(count).collect(),
            };
            let mut keys = Vec::with_capacity(entries.len());
            for entry in entries {
                let (_, key) = entry.map_err(storage_error)?;
                keys.push(key.value().to_string());
            }
            keys
        };
        let deleted = delete_keys(&write_txn, &keys)?;
        write_txn.commit().map_err(storage_error)?;
        Ok(deleted)
    }

    fn clear(&mut self, vacuum: bool) -> Result<(), CacheError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        write_txn.delete_table(RECORDS).map_err(storage_error)?;
        write_txn.delete_table(RECEIVED_AT).map_err(storage_error)?;
        write_txn.delete_table(INSERTION_SEQ).map_err(storage_error)?;
        write_txn.delete_table(INSERTION_ORDER).map_err(storage_error)?;
        {
            let _ = write_txn.open_table(RECORDS).map_err(storage_error)?;
            let _ = write_txn.open_table(RECEIVED_AT).map_err(storage_error)?;
            let _ = write_txn.open_table(INSERTION_SEQ).map_err(storage_error)?;
            let _ = write_txn.open_table(INSERTION_ORDER).map_err(storage_error)?;
        }
        write_txn.commit().map_err(storage_error)?;
        debug!(vacuum, "cleared record database");

        if vacuum {
            self.compact()?;
        }
        Ok(())
    }

    fn compact(&mut self) -> Result<(), CacheError> {
        self.db.compact().map_err(storage_error)?;
        Ok(())
    }

    fn read_schema_version(&self) -> Result<Option<u64>, CacheError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let metadata = match read_txn.open_table(METADATA) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(storage_error(e)),
        };
        let version = metadata
            .get(SCHEMA_VERSION_KEY)
            .map_err(storage_error)?
            .map(|v| v.value());
        Ok(version)
    }

    fn migrate(&mut self) -> Result<u64, CacheError> {
        self.ensure_tables()?;

        let stored = self.read_schema_version()?.unwrap_or(0);
        if stored > SCHEMA_VERSION {
            return Err(CacheError::Migration {
                version: stored,
                reason: format!("schema is newer than supported version {SCHEMA_VERSION}"),
            });
        }

        let mut reached = 0;
        for step in &MIGRATIONS {
            let write_txn = self.db.begin_write().map_err(storage_error)?;
            let current = Self::stored_version(&write_txn)?;
            if current >= step.version {
                write_txn.abort().map_err(storage_error)?;
                reached = current;
                continue;
            }

            (step.apply)(&write_txn).map_err(|e| CacheError::Migration {
                version: step.version,
                reason: e.to_string(),
            })?;
            {
                let mut metadata = write_txn.open_table(METADATA).map_err(storage_error)?;
                metadata
                    .insert(SCHEMA_VERSION_KEY, step.version)
                    .map_err(storage_error)?;
            }
            write_txn.commit().map_err(storage_error)?;
            info!(from = current, to = step.version, "migrated record database schema");
            reached = step.version;
        }

        Ok(reached)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(key: &str, at: i64) -> DatabaseRow {
        DatabaseRow {
            key: key.to_string(),
            serialized_fields: format!(r#"{{"id":"{key}"}}"#),
            last_received_at: at,
        }
    }

    fn keys_of(rows: &[DatabaseRow]) -> Vec<&str> {
        rows.iter().map(|r| r.key.as_str()).collect()
    }

    fn open_migrated(path: &Path) -> RedbRecordDatabase {
        let mut db = RedbRecordDatabase::open(path).expect("open db");
        db.migrate().expect("migrate");
        db
    }

    #[test]
    fn last_migration_matches_schema_version() {
        assert_eq!(MIGRATIONS.last().map(|m| m.version), Some(SCHEMA_VERSION));
    }

    #[test]
    fn fresh_database_migrates_to_current() {
        let temp = tempdir().expect("temp dir");
        let mut db = RedbRecordDatabase::open(temp.path().join("test.redb")).expect("open db");
        assert_eq!(db.read_schema_version().expect("version"), None);
        assert_eq!(db.migrate().expect("migrate"), SCHEMA_VERSION);
        assert_eq!(db.read_schema_version().expect("version"), Some(SCHEMA_VERSION));
        // Idempotent
        assert_eq!(db.migrate().expect("migrate"), SCHEMA_VERSION);
    }

    #[test]
    fn upsert_and_select() {
        let temp = tempdir().expect("temp dir");
        let mut db = open_migrated(&temp.path().join("test.redb"));

        db.upsert(&[row("QUERY_ROOT", 10), row("2001", 20)]).expect("upsert");

        let keys: BTreeSet<CacheKey> = ["2001", "1000"].iter().map(|k| k.to_string()).collect();
        let rows = db.select_rows(&keys).expect("select");
        assert_eq!(rows, vec![row("2001", 20)]);
    }

    #[test]
    fn upsert_reorders_replaced_rows() {
        let temp = tempdir().expect("temp dir");
        let mut db = open_migrated(&temp.path().join("test.redb"));

        db.upsert(&[row("a", 1), row("b", 1), row("c", 1)]).expect("upsert");
        db.upsert(&[row("a", 2)]).expect("upsert");

        let all = db.select_all().expect("select all");
        assert_eq!(keys_of(&all), vec!["b", "c", "a"]);
    }

    #[test]
    fn delete_operations() {
        let temp = tempdir().expect("temp dir");
        let mut db = open_migrated(&temp.path().join("test.redb"));
        db.upsert(&[
            row("QUERY_ROOT.hero", 5),
            row("QUERY_ROOT.hero.friends.0", 5),
            row("Droid:2001", 50),
            row("Human:1000", 100),
        ])
        .expect("upsert");

        assert!(db.delete_exact("Droid:2001").expect("delete"));
        assert!(!db.delete_exact("Droid:2001").expect("delete"));

        assert_eq!(
            db.delete_matching("query_root.HERO*").expect("delete"),
            vec!["QUERY_ROOT.hero".to_string(), "QUERY_ROOT.hero.friends.0".to_string()]
        );
        assert_eq!(keys_of(&db.select_all().expect("all")), vec!["Human:1000"]);

        assert_eq!(db.delete_received_before(100).expect("delete"), 0);
        assert_eq!(db.delete_received_before(101).expect("delete"), 1);
        assert!(db.select_all().expect("all").is_empty());
    }

    #[test]
    fn delete_by_insertion_order_from_both_ends() {
        let temp = tempdir().expect("temp dir");
        let mut db = open_migrated(&temp.path().join("test.redb"));
        db.upsert(&[row("a", 1), row("b", 1), row("c", 1), row("d", 1)])
            .expect("upsert");

        assert_eq!(db.delete_by_insertion_order(InsertionEnd::First, 1).expect("delete"), 1);
        assert_eq!(db.delete_by_insertion_order(InsertionEnd::Last, 2).expect("delete"), 2);
        assert_eq!(keys_of(&db.select_all().expect("all")), vec!["b"]);

        assert_eq!(db.delete_by_insertion_order(InsertionEnd::Last, 10).expect("delete"), 1);
        assert_eq!(db.delete_by_insertion_order(InsertionEnd::First, 0).expect("delete"), 0);
    }

    #[test]
    fn clear_keeps_schema_version() {
        let temp = tempdir().expect("temp dir");
        let mut db = open_migrated(&temp.path().join("test.redb"));
        db.upsert(&[row("a", 1), row("b", 2)]).expect("upsert");

        db.clear(true).expect("clear");
        assert!(db.select_all().expect("all").is_empty());
        assert_eq!(db.read_schema_version().expect("version"), Some(SCHEMA_VERSION));

        db.upsert(&[row("c", 3)]).expect("upsert after clear");
        assert_eq!(keys_of(&db.select_all().expect("all")), vec!["c"]);
    }

    #[test]
    fn persists_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("test.redb");
        {
            let mut db = open_migrated(&path);
            db.upsert(&[row("a", 1), row("b", 2)]).expect("upsert");
        }
        let db = open_migrated(&path);
        assert_eq!(db.select_all().expect("all"), vec![row("a", 1), row("b", 2)]);
    }

    #[test]
    fn migrates_unversioned_database() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("legacy.redb");
        {
            let db = Database::create(&path).expect("create");
            let write_txn = db.begin_write().expect("begin");
            {
                let mut records = write_txn.open_table(RECORDS).expect("table");
                records.insert("b", r#"{"id":"b"}"#).expect("insert");
                records.insert("a", r#"{"id":"a"}"#).expect("insert");
            }
            write_txn.commit().expect("commit");
        }

        let mut db = RedbRecordDatabase::open(&path).expect("open db");
        assert_eq!(db.read_schema_version().expect("version"), None);
        assert_eq!(db.migrate().expect("migrate"), SCHEMA_VERSION);

        // Backfilled rows are ordered by key and received at the epoch.
        assert_eq!(db.select_all().expect("all"), vec![row("a", 0), row("b", 0)]);

        db.upsert(&[row("c", 9)]).expect("upsert");
        assert_eq!(keys_of(&db.select_all().expect("all")), vec!["a", "b", "c"]);
    }

    #[test]
    fn refuses_newer_schema() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("future.redb");
        {
            let db = Database::create(&path).expect("create");
            let write_txn = db.begin_write().expect("begin");
            {
                let mut metadata = write_txn.open_table(METADATA).expect("table");
                metadata
                    .insert(SCHEMA_VERSION_KEY, SCHEMA_VERSION + 1)
                    .expect("insert");
            }
            write_txn.commit().expect("commit");
        }

        let mut db = RedbRecordDatabase::open(&path).expect("open db");
        let err = db.migrate().expect_err("must refuse");
        assert!(matches!(err, CacheError::Migration { .. }));
    }

    #[test]
    fn migrates_from_intermediate_version() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("v1.redb");
        {
            let db = Database::create(&path).expect("create");
            let write_txn = db.begin_write().expect("begin");
            {
                let mut records = write_txn.open_table(RECORDS).expect("table");
                records.insert("a", r#"{"id":"a"}"#).expect("insert");
                let mut received = write_txn.open_table(RECEIVED_AT).expect("table");
                received.insert("a", 42i64).expect("insert");
                let mut metadata = write_txn.open_table(METADATA).expect("table");
                metadata.insert(SCHEMA_VERSION_KEY, 1u64).expect("insert");
            }
            write_txn.commit().expect("commit");
        }

        let mut db = RedbRecordDatabase::open(&path).expect("open db");
        assert_eq!(db.read_schema_version().expect("version"), Some(1));
        assert_eq!(db.migrate().expect("migrate"), SCHEMA_VERSION);
        assert_eq!(db.select_all().expect("all"), vec![row("a", 42)]);
    }
}
