//! # Persistence Tests
//!
//! A redb-backed store behaves like the in-memory one and keeps its
//! records, timestamps and insertion order across reopen.

use gqlcache_core::{
    CacheClearingPolicy, CacheConfig, CacheStore, CachePolicy, GraphQLResponse, JsonObject,
    Operation, OutputType, Selection, SelectionSet, StorageBackend, Timestamp,
    identity_key_fn,
};
use serde_json::{Value, json};
use std::path::Path;
use tempfile::tempdir;

fn hero_query() -> Operation {
    Operation::query(
        "Hero",
        SelectionSet::new([Selection::field(
            "hero",
            OutputType::object([
                Selection::field("id", OutputType::id().non_null()),
                Selection::field("name", OutputType::string().non_null()),
                Selection::field(
                    "friends",
                    OutputType::object([
                        Selection::field("id", OutputType::id().non_null()),
                        Selection::field("name", OutputType::string().non_null()),
                    ])
                    .list_of(),
                ),
            ]),
        )]),
    )
}

fn body(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

fn hero_body(hero_name: &str) -> JsonObject {
    body(json!({"data": {"hero": {
        "id": "2001",
        "name": hero_name,
        "friends": [
            {"id": "1000", "name": "Luke Skywalker"},
            {"id": "1002", "name": "Han Solo"}
        ]
    }}}))
}

fn open_store(path: &Path) -> CacheStore {
    let backend = StorageBackend::open_redb(path, false).expect("open redb");
    CacheStore::new(backend).with_cache_key_fn(Some(identity_key_fn("id")))
}

fn publish(store: &CacheStore, operation: &Operation, body: JsonObject, received_at: i64) {
    let (_, records) = GraphQLResponse::new(operation, body)
        .with_cache_key_fn(store.cache_key_fn().cloned())
        .with_received_at(Timestamp(received_at))
        .parse_result(CachePolicy::CacheElseNetwork)
        .expect("parse");
    store.publish(records.expect("records")).expect("publish");
}

#[test]
fn published_records_survive_reopen() {
    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("cache.redb");
    let operation = hero_query();

    {
        let store = open_store(&path);
        publish(&store, &operation, hero_body("R2-D2"), 100);
    }

    let store = open_store(&path);
    let result = store.load(&operation).expect("load");
    assert_eq!(
        result.data,
        Some(json!({"hero": {
            "id": "2001",
            "name": "R2-D2",
            "friends": [
                {"id": "1000", "name": "Luke Skywalker"},
                {"id": "1002", "name": "Han Solo"}
            ]
        }}))
    );
    assert!(
        result
            .dependent_keys
            .as_ref()
            .is_some_and(|keys| keys.contains("1002.name"))
    );
}

#[test]
fn republishing_reports_only_changed_fields() {
    let temp = tempdir().expect("temp dir");
    let store = open_store(&temp.path().join("cache.redb"));
    let operation = hero_query();
    publish(&store, &operation, hero_body("R2-D2"), 100);

    let (_, records) = GraphQLResponse::new(&operation, hero_body("Artoo"))
        .with_cache_key_fn(store.cache_key_fn().cloned())
        .parse_result(CachePolicy::CacheElseNetwork)
        .expect("parse");
    let changed = store.publish(records.expect("records")).expect("publish");

    assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec!["2001.name".to_string()]);
}

#[test]
fn clearing_policies_on_disk() {
    let temp = tempdir().expect("temp dir");
    let store = open_store(&temp.path().join("cache.redb"));
    let operation = hero_query();
    publish(&store, &operation, hero_body("R2-D2"), 100);

    store
        .clear(&CacheClearingPolicy::Key("1002".to_string()), false)
        .expect("clear key");
    let error = store.load(&operation).expect_err("friend evicted");
    assert!(error.is_cache_miss());

    publish(&store, &operation, hero_body("R2-D2"), 200);
    assert!(store.load(&operation).is_ok());

    store
        .clear(&CacheClearingPolicy::MatchingPattern("query_root".to_string()), true)
        .expect("clear pattern");
    assert!(store.load(&operation).expect_err("root evicted").is_cache_miss());

    store
        .clear(&CacheClearingPolicy::AllRecords, true)
        .expect("clear all");
    let snapshot = store.export_snapshot().expect("export");
    let empty = CacheStore::default();
    empty.import_snapshot(&snapshot).expect("import");
    assert!(empty.load(&operation).is_err());
}

#[test]
fn snapshot_moves_records_between_backends() {
    let temp = tempdir().expect("temp dir");
    let operation = hero_query();

    let memory = CacheStore::default().with_cache_key_fn(Some(identity_key_fn("id")));
    publish(&memory, &operation, hero_body("R2-D2"), 100);
    let snapshot = memory.export_snapshot().expect("export");

    let disk = open_store(&temp.path().join("cache.redb"));
    disk.import_snapshot(&snapshot).expect("import");

    let from_memory = memory.load(&operation).expect("memory");
    let from_disk = disk.load(&operation).expect("disk");
    assert_eq!(from_memory.data, from_disk.data);
    assert_eq!(from_disk.metadata.max_age, Timestamp(100));
}

#[test]
fn config_opens_keyed_redb_store() {
    let temp = tempdir().expect("temp dir");
    let path = temp.path().join("cache.redb");
    let config = CacheConfig::from_toml_str(&format!(
        "[store]\nbackend = \"redb\"\npath = {:?}\ncache_key_field = \"id\"\n",
        path.display().to_string()
    ))
    .expect("config");

    let operation = hero_query();
    {
        let store = config.open_store().expect("open");
        publish(&store, &operation, hero_body("R2-D2"), 100);
    }

    let store = config.open_store().expect("reopen");
    let friend = store
        .within_read_transaction(|transaction| transaction.load_object("1000"))
        .expect("load friend");
    assert_eq!(friend.last_received_at, Timestamp(100));
}
