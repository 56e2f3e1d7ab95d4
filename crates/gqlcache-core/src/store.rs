//! # Cache Store
//!
//! The shared, transactional record store.
//!
//! A `CacheStore` owns a normalized cache behind a `parking_lot::RwLock`.
//! All access goes through transactions:
//!
//! - A read transaction holds the read lock. Any number may run at once.
//! - A read-write transaction holds the write lock, excluding every other
//!   transaction, so no reader ever sees a partially merged write.
//!
//! Transactions are scoped to a closure and release the lock on every exit
//! path. References met while executing against the cache are resolved
//! through a weak [`TransactionHandle`]: a resolution forced after the
//! transaction ended fails with `NotWithinTransaction`.
//!
//! Subscribers are notified of changed keys after a write transaction has
//! released its lock, and when the store is cleared.

use crate::cache::{CacheClearingPolicy, NormalizedCache, StorageBackend};
use crate::cache_key::field_key;
use crate::execution::{
    CacheDataSource, CacheKeyFn, DependencyTracker, FirstReceivedAtTracker, GraphQLExecutor,
    JsonObject, NetworkResponseSource, PossiblyDeferred, ResultAccumulator, ResultNormalizer,
    SelectionSet, SelectionSetMapper,
};
use crate::formats::{rows_from_bytes, rows_to_bytes};
use crate::operation::{Operation, Variables};
use crate::record_set::RecordSet;
use crate::response::GraphQLResult;
use crate::types::{CacheError, CacheKey, RecordRow, Timestamp};
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

// =============================================================================
// SUBSCRIBERS
// =============================================================================

/// Observer of store changes.
pub trait CacheSubscriber: Send + Sync {
    /// Field keys (`<recordKey>.<field>`) changed by a write; removed
    /// records are reported by their record key.
    fn store_did_change(&self, changed_keys: &BTreeSet<CacheKey>);

    /// The store was cleared.
    fn store_did_clear(&self) {}
}

/// Identifies a subscription for `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Subscribers = BTreeMap<SubscriptionId, Arc<dyn CacheSubscriber>>;

// =============================================================================
// TRANSACTION STATE
// =============================================================================

enum CacheGuard<C> {
    Read(ArcRwLockReadGuard<RawRwLock, C>),
    Write(ArcRwLockWriteGuard<RawRwLock, C>),
}

/// What a live transaction owns: the lock guard and the rows it loaded.
struct TransactionState<C> {
    guard: RefCell<CacheGuard<C>>,
    loaded: RefCell<BTreeMap<CacheKey, RecordRow>>,
}

impl<C: NormalizedCache> TransactionState<C> {
    fn new(guard: CacheGuard<C>) -> Self {
        Self {
            guard: RefCell::new(guard),
            loaded: RefCell::new(BTreeMap::new()),
        }
    }

    fn cache(&self) -> Ref<'_, C> {
        Ref::map(self.guard.borrow(), |guard| match guard {
            CacheGuard::Read(read) => &**read,
            CacheGuard::Write(write) => &**write,
        })
    }

    fn cache_mut(&self) -> Result<RefMut<'_, C>, CacheError> {
        RefMut::filter_map(self.guard.borrow_mut(), |guard| match guard {
            CacheGuard::Write(write) => Some(&mut **write),
            CacheGuard::Read(_) => None,
        })
        .map_err(|_| CacheError::Storage("write attempted in a read transaction".to_string()))
    }

    /// Rows for `keys`, from this transaction's memo where possible.
    fn load_rows(&self, keys: &BTreeSet<CacheKey>) -> Result<BTreeMap<CacheKey, RecordRow>, CacheError> {
        let mut found = BTreeMap::new();
        let mut missing = BTreeSet::new();
        {
            let loaded = self.loaded.borrow();
            for key in keys {
                match loaded.get(key) {
                    Some(row) => {
                        found.insert(key.clone(), row.clone());
                    }
                    None => {
                        missing.insert(key.clone());
                    }
                }
            }
        }

        if !missing.is_empty() {
            let rows = self.cache().load_records(&missing)?;
            let mut loaded = self.loaded.borrow_mut();
            for (key, row) in rows {
                loaded.insert(key.clone(), row.clone());
                found.insert(key, row);
            }
        }
        Ok(found)
    }

    fn load_row(&self, key: &str) -> Result<RecordRow, CacheError> {
        let keys = BTreeSet::from([key.to_string()]);
        self.load_rows(&keys)?
            .remove(key)
            .ok_or_else(|| CacheError::CacheMiss(key.to_string()))
    }

    fn forget_loaded(&self) {
        self.loaded.borrow_mut().clear();
    }
}

/// A non-owning handle to a transaction.
pub struct TransactionHandle<C> {
    state: Weak<TransactionState<C>>,
}

impl<C> Clone for TransactionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<C> fmt::Debug for TransactionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("open", &(self.state.strong_count() > 0))
            .finish()
    }
}

impl<C: NormalizedCache + 'static> TransactionHandle<C> {
    /// Whether the transaction is still running.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.strong_count() > 0
    }

    /// Load the row at `key` when forced.
    ///
    /// Fails with `NotWithinTransaction` if the transaction has ended by
    /// then, and with `CacheMiss` if there is no such row.
    #[must_use]
    pub fn load_object(&self, key: &str) -> PossiblyDeferred<'static, RecordRow> {
        let state = self.state.clone();
        let key = key.to_string();
        PossiblyDeferred::deferred(move || {
            let state = state.upgrade().ok_or(CacheError::NotWithinTransaction)?;
            state.load_row(&key)
        })
    }
}

// =============================================================================
// READ TRANSACTION
// =============================================================================

pub struct ReadTransaction<C> {
    state: Rc<TransactionState<C>>,
    cache_key_fn: Option<CacheKeyFn>,
}

impl<C> fmt::Debug for ReadTransaction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadTransaction").finish_non_exhaustive()
    }
}

impl<C: NormalizedCache + 'static> ReadTransaction<C> {
    fn new(guard: CacheGuard<C>, cache_key_fn: Option<CacheKeyFn>) -> Self {
        Self {
            state: Rc::new(TransactionState::new(guard)),
            cache_key_fn,
        }
    }

    #[must_use]
    pub fn handle(&self) -> TransactionHandle<C> {
        TransactionHandle {
            state: Rc::downgrade(&self.state),
        }
    }

    /// Rows for `keys`; absent keys are not in the result.
    pub fn load_records(&self, keys: &BTreeSet<CacheKey>) -> Result<BTreeMap<CacheKey, RecordRow>, CacheError> {
        self.state.load_rows(keys)
    }

    /// The row at `key`, or `CacheMiss`.
    pub fn load_object(&self, key: &str) -> Result<RecordRow, CacheError> {
        self.state.load_row(key)
    }

    /// Execute `selection_set` on the record at `key` with any accumulator.
    pub fn execute<A: ResultAccumulator>(
        &self,
        selection_set: &SelectionSet,
        key: &str,
        variables: &Variables,
        accumulator: A,
    ) -> Result<A::FinalResult, CacheError> {
        let root = self.load_object(key)?;
        let executor = GraphQLExecutor::new(CacheDataSource::new(self.handle()));
        executor.execute(selection_set, &root, key, variables, accumulator)
    }

    /// Read the object at `key` as JSON data.
    pub fn read_object(
        &self,
        selection_set: &SelectionSet,
        key: &str,
        variables: &Variables,
    ) -> Result<JsonObject, CacheError> {
        self.execute(selection_set, key, variables, SelectionSetMapper::new())
    }

    /// Read data, dependent keys and freshness for the object at `root_key`.
    pub fn load_result(
        &self,
        selection_set: &SelectionSet,
        root_key: &str,
        variables: &Variables,
    ) -> Result<GraphQLResult, CacheError> {
        let (data, dependent_keys, metadata) = self.execute(
            selection_set,
            root_key,
            variables,
            (
                SelectionSetMapper::new(),
                DependencyTracker::new(),
                FirstReceivedAtTracker::new(),
            ),
        )?;
        Ok(GraphQLResult::from_cache(data, dependent_keys, metadata))
    }

    /// Read `operation` from its root record.
    pub fn read_operation(&self, operation: &Operation) -> Result<GraphQLResult, CacheError> {
        self.load_result(
            &operation.selection_set,
            operation.root_key(),
            &operation.variables,
        )
    }
}

// =============================================================================
// READ-WRITE TRANSACTION
// =============================================================================

/// A transaction holding the write lock. Reads see earlier writes of the
/// same transaction.
pub struct ReadWriteTransaction<C> {
    read: ReadTransaction<C>,
    changed_keys: BTreeSet<CacheKey>,
}

impl<C> fmt::Debug for ReadWriteTransaction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadWriteTransaction")
            .field("changed_keys", &self.changed_keys.len())
            .finish_non_exhaustive()
    }
}

impl<C> Deref for ReadWriteTransaction<C> {
    type Target = ReadTransaction<C>;

    fn deref(&self) -> &Self::Target {
        &self.read
    }
}

impl<C: NormalizedCache + 'static> ReadWriteTransaction<C> {
    fn record_changes(&mut self, changed: impl IntoIterator<Item = CacheKey>) {
        self.read.state.forget_loaded();
        self.changed_keys.extend(changed);
    }

    /// Merge `records`, returning the changed field keys.
    pub fn merge(&mut self, records: RecordSet) -> Result<BTreeSet<CacheKey>, CacheError> {
        let changed = self.read.state.cache_mut()?.merge(records)?;
        self.record_changes(changed.iter().cloned());
        Ok(changed)
    }

    /// Returns whether the record existed.
    pub fn remove_record(&mut self, key: &str) -> Result<bool, CacheError> {
        let removed = self.read.state.cache_mut()?.remove_record(key)?;
        if removed {
            self.record_changes([key.to_string()]);
        }
        Ok(removed)
    }

    /// Remove records whose key matches `pattern` (case-insensitive, `*`
    /// wildcards). Returns the removed keys.
    pub fn remove_records_matching(&mut self, pattern: &str) -> Result<Vec<CacheKey>, CacheError> {
        let removed = self
            .read
            .state
            .cache_mut()?
            .remove_records_matching(pattern)?;
        if !removed.is_empty() {
            self.record_changes(removed.iter().cloned());
        }
        Ok(removed)
    }

    /// Normalize `object` for `selection_set` under `key` and merge it.
    pub fn write_object(
        &mut self,
        object: &JsonObject,
        selection_set: &SelectionSet,
        key: &str,
        variables: &Variables,
    ) -> Result<BTreeSet<CacheKey>, CacheError> {
        let now = Timestamp::now();
        let source = NetworkResponseSource::new(now).with_cache_key_fn(self.read.cache_key_fn.clone());
        let records = GraphQLExecutor::new(source).execute(
            selection_set,
            object,
            key,
            variables,
            ResultNormalizer::new(now),
        )?;
        self.merge(records)
    }

    /// Read the object at `key`, let `body` modify it, and write it back.
    pub fn update_object<F>(
        &mut self,
        selection_set: &SelectionSet,
        key: &str,
        variables: &Variables,
        body: F,
    ) -> Result<BTreeSet<CacheKey>, CacheError>
    where
        F: FnOnce(&mut JsonObject) -> Result<(), CacheError>,
    {
        let mut data = self.read_object(selection_set, key, variables)?;
        body(&mut data)?;
        self.write_object(&data, selection_set, key, variables)
    }

    /// Keys changed so far in this transaction.
    #[must_use]
    pub const fn changed_keys(&self) -> &BTreeSet<CacheKey> {
        &self.changed_keys
    }

    fn finish(self) -> BTreeSet<CacheKey> {
        self.changed_keys
    }
}

// =============================================================================
// STORE
// =============================================================================

/// The shared record store.
pub struct CacheStore<C = StorageBackend> {
    cache: Arc<RwLock<C>>,
    subscribers: Arc<Mutex<Subscribers>>,
    next_subscription: Arc<AtomicU64>,
    cache_key_fn: Option<CacheKeyFn>,
}

impl<C> Clone for CacheStore<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            subscribers: Arc::clone(&self.subscribers),
            next_subscription: Arc::clone(&self.next_subscription),
            cache_key_fn: self.cache_key_fn.clone(),
        }
    }
}

impl<C> fmt::Debug for CacheStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("subscribers", &self.subscribers.lock().len())
            .field("keyed", &self.cache_key_fn.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for CacheStore<StorageBackend> {
    fn default() -> Self {
        Self::new(StorageBackend::default())
    }
}

impl<C: NormalizedCache + 'static> CacheStore<C> {
    #[must_use]
    pub fn new(cache: C) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            subscribers: Arc::new(Mutex::new(BTreeMap::new())),
            next_subscription: Arc::new(AtomicU64::new(0)),
            cache_key_fn: None,
        }
    }

    /// Key normalized objects by identity instead of by path.
    #[must_use]
    pub fn with_cache_key_fn(mut self, cache_key_fn: Option<CacheKeyFn>) -> Self {
        self.cache_key_fn = cache_key_fn;
        self
    }

    #[must_use]
    pub const fn cache_key_fn(&self) -> Option<&CacheKeyFn> {
        self.cache_key_fn.as_ref()
    }

    /// Run `body` in a read transaction.
    pub fn within_read_transaction<T, F>(&self, body: F) -> Result<T, CacheError>
    where
        F: FnOnce(&ReadTransaction<C>) -> Result<T, CacheError>,
    {
        let guard = CacheGuard::Read(self.cache.read_arc());
        let transaction = ReadTransaction::new(guard, self.cache_key_fn.clone());
        body(&transaction)
    }

    /// Run `body` in a read-write transaction.
    ///
    /// Writes made before an error are kept; subscribers hear about every
    /// change once the lock is released.
    pub fn within_read_write_transaction<T, F>(&self, body: F) -> Result<T, CacheError>
    where
        F: FnOnce(&mut ReadWriteTransaction<C>) -> Result<T, CacheError>,
    {
        let guard = CacheGuard::Write(self.cache.write_arc());
        let mut transaction = ReadWriteTransaction {
            read: ReadTransaction::new(guard, self.cache_key_fn.clone()),
            changed_keys: BTreeSet::new(),
        };
        let result = body(&mut transaction);
        let changed = transaction.finish();

        if !changed.is_empty() {
            self.notify_change(&changed);
        }
        result
    }

    /// Merge `records` into the store.
    pub fn publish(&self, records: RecordSet) -> Result<BTreeSet<CacheKey>, CacheError> {
        self.within_read_write_transaction(|transaction| transaction.merge(records))
    }

    /// Read `operation` from the store.
    pub fn load(&self, operation: &Operation) -> Result<GraphQLResult, CacheError> {
        self.within_read_transaction(|transaction| transaction.read_operation(operation))
    }

    /// Remove what `policy` names, optionally compacting storage.
    pub fn clear(&self, policy: &CacheClearingPolicy, compact: bool) -> Result<(), CacheError> {
        {
            let mut cache = self.cache.write();
            cache.clear(policy, compact)?;
        }
        debug!(?policy, compact, "cleared cache store");
        for subscriber in self.subscriber_list() {
            subscriber.store_did_clear();
        }
        Ok(())
    }

    /// Seed rows in order, keeping their timestamps.
    pub fn import_rows(&self, rows: Vec<RecordRow>) -> Result<(), CacheError> {
        let changed: BTreeSet<CacheKey> = rows
            .iter()
            .flat_map(|row| {
                row.record
                    .fields
                    .keys()
                    .map(|field| field_key(row.key(), field))
            })
            .collect();
        {
            let mut cache = self.cache.write();
            cache.import_rows(rows)?;
        }
        if !changed.is_empty() {
            self.notify_change(&changed);
        }
        Ok(())
    }

    /// Every row, in insertion order, as a snapshot.
    pub fn export_snapshot(&self) -> Result<Vec<u8>, CacheError> {
        let rows = self.cache.read().load_all()?;
        rows_to_bytes(&rows)
    }

    /// Seed the store from a snapshot.
    pub fn import_snapshot(&self, bytes: &[u8]) -> Result<(), CacheError> {
        let rows = rows_from_bytes(bytes)?;
        debug!(rows = rows.len(), "importing snapshot");
        self.import_rows(rows)
    }

    pub fn subscribe(&self, subscriber: Arc<dyn CacheSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().insert(id, subscriber);
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().remove(&id).is_some()
    }

    fn subscriber_list(&self) -> Vec<Arc<dyn CacheSubscriber>> {
        self.subscribers.lock().values().cloned().collect()
    }

    fn notify_change(&self, changed: &BTreeSet<CacheKey>) {
        for subscriber in self.subscriber_list() {
            subscriber.store_did_change(changed);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryNormalizedCache;
    use crate::execution::{OutputType, Selection};
    use crate::types::{CacheReference, Fields, Record};
    use serde_json::{Value, json};

    #[derive(Default)]
    struct Recorder {
        changes: Mutex<Vec<BTreeSet<CacheKey>>>,
        clears: AtomicU64,
    }

    impl CacheSubscriber for Recorder {
        fn store_did_change(&self, changed_keys: &BTreeSet<CacheKey>) {
            self.changes.lock().push(changed_keys.clone());
        }

        fn store_did_clear(&self) {
            self.clears.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn hero_store() -> CacheStore<InMemoryNormalizedCache> {
        let store = CacheStore::new(InMemoryNormalizedCache::new());
        store
            .publish(RecordSet::from_records(
                [
                    Record::new("QUERY_ROOT", Fields::new())
                        .with_field("hero", CacheReference::new("hero")),
                    Record::new("hero", Fields::new())
                        .with_field("name", "R2-D2")
                        .with_field("__typename", "Droid"),
                ],
                Timestamp(100),
            ))
            .expect("publish");
        store
    }

    fn hero_selection() -> SelectionSet {
        SelectionSet::new([Selection::field(
            "hero",
            OutputType::object([
                Selection::field("__typename", OutputType::string().non_null()),
                Selection::field("name", OutputType::string().non_null()),
            ]),
        )])
    }

    fn as_object(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        }
    }

    #[test]
    fn reads_through_references() {
        let store = hero_store();
        let operation = Operation::query("Hero", hero_selection());
        let result = store.load(&operation).expect("load");

        assert_eq!(
            result.data,
            Some(json!({"hero": {"__typename": "Droid", "name": "R2-D2"}}))
        );
        assert_eq!(result.metadata.max_age, Timestamp(100));
        let keys = result.dependent_keys.expect("keys");
        assert!(keys.contains("QUERY_ROOT.hero"));
        assert!(keys.contains("hero.name"));
    }

    #[test]
    fn missing_root_is_cache_miss() {
        let store = CacheStore::new(InMemoryNormalizedCache::new());
        let operation = Operation::query("Hero", hero_selection());
        let err = store.load(&operation).expect_err("must miss");
        assert_eq!(err, CacheError::CacheMiss("QUERY_ROOT".to_string()));
    }

    #[test]
    fn deferred_load_after_release_fails() {
        let store = hero_store();
        let pending = store
            .within_read_transaction(|transaction| Ok(transaction.handle().load_object("hero")))
            .expect("transaction");
        assert_eq!(pending.get(), Err(CacheError::NotWithinTransaction));

        let handle = store
            .within_read_transaction(|transaction| {
                let handle = transaction.handle();
                assert!(handle.is_open());
                assert_eq!(
                    handle.load_object("hero").get().map(|row| row.record.key),
                    Ok("hero".to_string())
                );
                Ok(handle)
            })
            .expect("transaction");
        assert!(!handle.is_open());
    }

    #[test]
    fn writes_are_visible_inside_the_transaction() {
        let store = hero_store();
        store
            .within_read_write_transaction(|transaction| {
                // Populate the memo, then overwrite.
                let before = transaction.read_object(&hero_selection(), "QUERY_ROOT", &Variables::new())?;
                assert_eq!(before["hero"]["name"], json!("R2-D2"));

                transaction.write_object(
                    &as_object(json!({"hero": {"__typename": "Droid", "name": "Artoo"}})),
                    &hero_selection(),
                    "QUERY_ROOT",
                    &Variables::new(),
                )?;
                let after = transaction.read_object(&hero_selection(), "QUERY_ROOT", &Variables::new())?;
                assert_eq!(after["hero"]["name"], json!("Artoo"));
                Ok(())
            })
            .expect("transaction");
    }

    #[test]
    fn update_object_rewrites_fields() {
        let store = hero_store();
        let changed = store
            .within_read_write_transaction(|transaction| {
                transaction.update_object(&hero_selection(), "QUERY_ROOT", &Variables::new(), |data| {
                    data.insert(
                        "hero".to_string(),
                        json!({"__typename": "Droid", "name": "Artoo-Detoo"}),
                    );
                    Ok(())
                })
            })
            .expect("update");
        assert!(!changed.is_empty());

        let result = store
            .load(&Operation::query("Hero", hero_selection()))
            .expect("load");
        assert_eq!(result.data_as::<Value>().expect("data")["hero"]["name"], json!("Artoo-Detoo"));
    }

    #[test]
    fn subscribers_hear_changes_and_clears() {
        let store = hero_store();
        let recorder = Arc::new(Recorder::default());
        let id = store.subscribe(recorder.clone());

        // Unchanged data notifies nobody.
        store
            .publish(RecordSet::from_records(
                [Record::new("hero", Fields::new()).with_field("name", "R2-D2")],
                Timestamp(200),
            ))
            .expect("publish");
        assert!(recorder.changes.lock().is_empty());

        store
            .publish(RecordSet::from_records(
                [Record::new("hero", Fields::new()).with_field("name", "Artoo")],
                Timestamp(200),
            ))
            .expect("publish");
        assert_eq!(
            recorder.changes.lock().as_slice(),
            &[BTreeSet::from(["hero.name".to_string()])]
        );

        store.clear(&CacheClearingPolicy::AllRecords, false).expect("clear");
        assert_eq!(recorder.clears.load(Ordering::Relaxed), 1);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn snapshot_round_trip_between_stores() {
        let store = hero_store();
        let bytes = store.export_snapshot().expect("export");

        let copy = CacheStore::new(InMemoryNormalizedCache::new());
        copy.import_snapshot(&bytes).expect("import");
        let result = copy
            .load(&Operation::query("Hero", hero_selection()))
            .expect("load");
        assert_eq!(result.metadata.max_age, Timestamp(100));
    }

    #[test]
    fn concurrent_readers_share_the_store() {
        let store = hero_store();
        let operation = Operation::query("Hero", hero_selection());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let operation = operation.clone();
                std::thread::spawn(move || store.load(&operation).map(|result| result.data))
            })
            .collect();
        for handle in handles {
            let data = handle.join().expect("join").expect("load");
            assert_eq!(data, Some(json!({"hero": {"__typename": "Droid", "name": "R2-D2"}})));
        }
    }
}
