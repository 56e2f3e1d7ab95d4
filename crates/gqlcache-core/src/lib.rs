//! # gqlcache-core
//!
//! The normalized GraphQL response cache engine - THE STORE.
//!
//! Responses are flattened into a graph of keyed records linked by
//! references. Reads re-assemble typed results from those records, merges
//! report exactly which fields changed, and a policy engine arbitrates
//! between cache and network.
//!
//! ## Layers
//!
//! - `types`, `cache_key`, `record_set`, `merge` → the record model
//! - `execution` → one selection-set walk over a network or cache source
//! - `response`, `policy` → parsing network bodies, cache/network decisions
//! - `cache`, `storage` → in-memory and redb-backed normalized caches
//! - `store` → the shared store and its transactions
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - The store is constructed explicitly and passed around; there is no
//!   global instance
//! - Every keyed collection is a `BTreeMap`/`BTreeSet`, so iteration order
//!   (and therefore changed-key sets and snapshots) is deterministic

// =============================================================================
// MODULES
// =============================================================================

pub mod cache;
pub mod cache_key;
pub mod config;
pub mod execution;
pub mod formats;
pub mod merge;
pub mod operation;
pub mod policy;
pub mod primitives;
pub mod record_set;
pub mod response;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CacheError, CacheKey, CachePath, CacheReference, FieldValue, Fields, KeyPath, Record,
    RecordRow, ResponsePath, Timestamp,
};

// =============================================================================
// RE-EXPORTS: Record Model
// =============================================================================

pub use cache_key::{field_key, matches_key_pattern, record_key_of, split_components};
pub use merge::MergeEngine;
pub use operation::{Operation, OperationType, Variables};
pub use record_set::RecordSet;

// =============================================================================
// RE-EXPORTS: Execution
// =============================================================================

pub use execution::{
    CacheDataSource, CacheKeyFn, DependencyTracker, ExecutionSource, Field,
    FirstReceivedAtTracker, GraphQLExecutor, HandleMissingValues, InputValue, JsonObject,
    NetworkResponseSource, OutputType, PossiblyDeferred, ResultAccumulator, ResultMetadata,
    ResultNormalizer, ScalarType, Selection, SelectionSet, SelectionSetMapper, identity_key_fn,
};

// =============================================================================
// RE-EXPORTS: Responses & Policies
// =============================================================================

pub use policy::{
    CacheOutcome, CachePolicy, Freshness, PolicyDecision, PolicyFailure, decide,
};
pub use response::{GraphQLError, GraphQLResponse, GraphQLResult, ResultSource, SourceLocation};

// =============================================================================
// RE-EXPORTS: Caches, Storage & Store
// =============================================================================

pub use cache::{
    CacheClearingPolicy, InMemoryNormalizedCache, NormalizedCache, PersistentNormalizedCache,
    StorageBackend,
};
pub use config::{BackendKind, CacheConfig, PolicyConfig, StoreConfig};
pub use storage::{DatabaseRow, InsertionEnd, PersistenceAdapter, RedbRecordDatabase};
pub use store::{
    CacheStore, CacheSubscriber, ReadTransaction, ReadWriteTransaction, SubscriptionId,
    TransactionHandle,
};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::{SnapshotHeader, deserialize_fields, rows_from_bytes, rows_to_bytes, serialize_fields};
