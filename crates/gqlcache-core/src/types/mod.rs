//! # Core Type Definitions
//!
//! This module contains the record model shared by every layer of the cache:
//! - Keys and timestamps (`CacheKey`, `Timestamp`)
//! - Record graph (`FieldValue`, `CacheReference`, `Record`, `RecordRow`)
//! - Positional paths (`KeyPath`, with `ResponsePath`/`CachePath` aliases)
//! - Error types (`CacheError`)
//!
//! ## Graph Shape
//!
//! Records never embed each other. A field that points at another object holds
//! a `CacheReference`, which is nothing more than the target's key. The record
//! graph may therefore contain cycles; every traversal is key-based.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

// =============================================================================
// KEYS & TIMESTAMPS
// =============================================================================

/// Opaque string identifying one record or one field path within a record.
///
/// Built by joining path segments with `.`; a segment may itself contain
/// literal dots inside a parenthesized argument list, e.g. `hero(episode:JEDI)`.
pub type CacheKey = String;

/// Seconds since the Unix epoch.
///
/// Freshness comparisons only ever look at minute buckets, so second
/// resolution is all the cache keeps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The oldest representable instant. Reported as `maxAge` when a result
    /// has no contributing fields.
    pub const DISTANT_PAST: Self = Self(i64::MIN);

    /// The current wall-clock time.
    ///
    /// A clock set before the epoch reads as the epoch itself.
    #[must_use]
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| Self(elapsed.as_secs() as i64))
            .unwrap_or(Self(0))
    }

    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    #[must_use]
    pub const fn secs(self) -> i64 {
        self.0
    }

    /// Index of the minute this instant falls into.
    #[must_use]
    pub const fn minute_bucket(self) -> i64 {
        self.0.div_euclid(60)
    }

    /// Move this instant `secs` seconds into the past, saturating.
    #[must_use]
    pub const fn saturating_sub_secs(self, secs: i64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Move this instant `secs` seconds into the future, saturating.
    #[must_use]
    pub const fn saturating_add_secs(self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

// =============================================================================
// RECORD GRAPH
// =============================================================================

/// A by-key, non-owning link from one record's field to another record.
///
/// Dereferencing requires a lookup against the store and may fail if the
/// target has been evicted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheReference {
    pub key: CacheKey,
}

impl CacheReference {
    #[must_use]
    pub fn new(key: impl Into<CacheKey>) -> Self {
        Self { key: key.into() }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-> #{}", self.key)
    }
}

/// A single stored value.
///
/// `Object` only appears for values the schema treats as scalars (custom
/// scalars carrying JSON objects); selected objects are always normalized
/// into their own records and linked through `Reference`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Reference(CacheReference),
    List(Vec<FieldValue>),
    Object(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Convert a plain JSON value into a stored value. Never yields a reference.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back into plain JSON.
    ///
    /// Returns `None` when the value (or anything nested in it) is a
    /// reference, which has no plain JSON form.
    #[must_use]
    pub fn to_plain_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Reference(_) => return None,
            Self::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Self::to_plain_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Self::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| v.to_plain_json().map(|v| (k.clone(), v)))
                    .collect::<Option<serde_json::Map<_, _>>>()?,
            ),
        })
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_reference(&self) -> Option<&CacheReference> {
        match self {
            Self::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Short name of the value's kind, used in type-mismatch errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Reference(_) => "reference",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }
}

impl From<CacheReference> for FieldValue {
    fn from(reference: CacheReference) -> Self {
        Self::Reference(reference)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Field name to value mapping of one record.
pub type Fields = BTreeMap<String, FieldValue>;

/// One normalized object: a key and its flat fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: CacheKey,
    pub fields: Fields,
}

impl Record {
    #[must_use]
    pub fn new(key: impl Into<CacheKey>, fields: Fields) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Builder-style field insertion, handy when seeding stores.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(field.into(), value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A record plus the time any of its fields last changed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub record: Record,
    pub last_received_at: Timestamp,
}

impl RecordRow {
    #[must_use]
    pub const fn new(record: Record, last_received_at: Timestamp) -> Self {
        Self {
            record,
            last_received_at,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.record.key
    }
}

// =============================================================================
// PATHS
// =============================================================================

/// Sequence of path segments.
///
/// Used for two different coordinate systems: response paths (response keys
/// and list indices, as a caller sees the data) and cache paths (field cache
/// keys, as records are keyed). Displayed joined with `.`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct KeyPath(Vec<String>);

/// Path of a value in the response, as the caller sees it.
pub type ResponsePath = KeyPath;

/// Path of a value in the record graph, rooted at the owning record's key.
pub type CachePath = KeyPath;

impl KeyPath {
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Path made of a single segment (typically a record key).
    #[must_use]
    pub fn from_key(key: impl Into<String>) -> Self {
        Self(vec![key.into()])
    }

    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// New path with `segment` appended.
    #[must_use]
    pub fn appending(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Segments joined with `.`, the cache-key form of the path.
    #[must_use]
    pub fn joined(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the cache.
///
/// - No silent failures
/// - Use `Result<T, CacheError>` for fallible operations
/// - Execution failures carry the response path where they happened
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CacheError {
    /// No row exists for a key that a read required.
    #[error("No cache record for key: {0}")]
    CacheMiss(CacheKey),

    /// The selection requires a field the source object does not have.
    #[error("Missing value")]
    MissingFieldValue,

    /// A non-nullable selection found a null.
    #[error("Null value found for non-null field")]
    NullFieldValue,

    /// A value could not be converted to the requested type.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A persisted payload failed to deserialize.
    #[error("Invalid record encoding for {key}: {reason}")]
    InvalidRecordEncoding { key: CacheKey, reason: String },

    /// Cache hit past its TTL under a cache-only policy.
    #[error("Cached data has expired")]
    StaleData,

    /// Reference resolution attempted after the transaction was released.
    #[error("Not within a read transaction")]
    NotWithinTransaction,

    /// An execution error annotated with the response path it occurred at.
    #[error("Error at path \"{path}\": {source}")]
    Execution {
        path: ResponsePath,
        source: Box<CacheError>,
    },

    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Snapshot or field-format encoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A schema migration step failed; the backend instance is unusable.
    #[error("Migration to schema version {version} failed: {reason}")]
    Migration { version: u64, reason: String },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Result data could not be decoded into the requested type.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl CacheError {
    /// Annotate with a response path.
    ///
    /// An error that already carries a path is returned unchanged, so the
    /// innermost (deepest) path is the one reported.
    #[must_use]
    pub fn at_path(self, path: &ResponsePath) -> Self {
        match self {
            annotated @ Self::Execution { .. } => annotated,
            other => Self::Execution {
                path: path.clone(),
                source: Box::new(other),
            },
        }
    }

    /// Response path of an annotated execution error.
    #[must_use]
    pub fn path(&self) -> Option<&ResponsePath> {
        match self {
            Self::Execution { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The error with any path annotation peeled off.
    #[must_use]
    pub fn underlying(&self) -> &Self {
        match self {
            Self::Execution { source, .. } => source.underlying(),
            other => other,
        }
    }

    #[must_use]
    pub fn is_cache_miss(&self) -> bool {
        matches!(self.underlying(), Self::CacheMiss(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================
