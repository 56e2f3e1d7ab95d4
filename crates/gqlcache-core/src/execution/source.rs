//! # Execution Sources
//!
//! Where raw field values come from.
//!
//! - `NetworkResponseSource` reads a plain JSON tree. Nothing is deferred.
//! - `CacheDataSource` reads stored rows. References are resolved through a
//!   weak handle to the enclosing read transaction, lazily, so a resolution
//!   forced after the transaction is released fails with
//!   `NotWithinTransaction`.

use super::deferred::{PossiblyDeferred, lazily_evaluate_all};
use super::selection::OutputType;
use super::FieldExecutionInfo;
use crate::cache::NormalizedCache;
use crate::primitives::TYPENAME_FIELD;
use crate::store::TransactionHandle;
use crate::types::{CacheKey, FieldValue, RecordRow, ResponsePath, Timestamp};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A JSON object of a network response.
pub type JsonObject = serde_json::Map<String, Value>;

/// Computes the identity key of a response object, if it has one.
pub type CacheKeyFn = Arc<dyn Fn(&JsonObject) -> Option<CacheKey> + Send + Sync>;

/// Key objects by the value of `field` (string or number).
#[must_use]
pub fn identity_key_fn(field: impl Into<String>) -> CacheKeyFn {
    let field = field.into();
    Arc::new(move |object: &JsonObject| match object.get(&field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// A field value as read from a source, shaped by the field's output type.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue<O> {
    /// The object has no such field.
    Missing,
    Null,
    Leaf(FieldValue),
    Object(O),
    List(Vec<RawValue<O>>),
}

impl<O> RawValue<O> {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Null => "null",
            Self::Leaf(value) => value.kind(),
            Self::Object(_) => "object",
            Self::List(_) => "list",
        }
    }
}

/// Supplies raw field values to the executor.
pub trait ExecutionSource {
    type RawObject: 'static;

    /// Value of the field described by `info` on `object`, with the time it
    /// was received.
    fn resolve_field<'s>(
        &'s self,
        info: &FieldExecutionInfo<'_>,
        object: &Self::RawObject,
    ) -> PossiblyDeferred<'s, (RawValue<Self::RawObject>, Timestamp)>;

    /// Identity key of `object`, if it can be identified.
    fn compute_cache_key(&self, object: &Self::RawObject) -> Option<CacheKey>;

    /// Concrete type name of `object`, for fragment matching.
    fn typename(&self, object: &Self::RawObject) -> Option<String>;
}

// =============================================================================
// NETWORK RESPONSE
// =============================================================================

/// Reads a live JSON response. Every value was received at one instant.
#[derive(Clone)]
pub struct NetworkResponseSource {
    received_at: Timestamp,
    cache_key_fn: Option<CacheKeyFn>,
}

impl fmt::Debug for NetworkResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkResponseSource")
            .field("received_at", &self.received_at)
            .field("keyed", &self.cache_key_fn.is_some())
            .finish()
    }
}

impl NetworkResponseSource {
    #[must_use]
    pub const fn new(received_at: Timestamp) -> Self {
        Self {
            received_at,
            cache_key_fn: None,
        }
    }

    #[must_use]
    pub fn with_cache_key_fn(mut self, cache_key_fn: Option<CacheKeyFn>) -> Self {
        self.cache_key_fn = cache_key_fn;
        self
    }
}

fn raw_from_json(value: &Value, output: &OutputType) -> RawValue<JsonObject> {
    match (output.nullable_inner(), value) {
        (_, Value::Null) => RawValue::Null,
        (OutputType::List(element), Value::Array(items)) => RawValue::List(
            items
                .iter()
                .map(|item| raw_from_json(item, element))
                .collect(),
        ),
        (OutputType::Object(_), Value::Object(map)) => RawValue::Object(map.clone()),
        (_, other) => RawValue::Leaf(FieldValue::from_json(other)),
    }
}

impl ExecutionSource for NetworkResponseSource {
    type RawObject = JsonObject;

    fn resolve_field<'s>(
        &'s self,
        info: &FieldExecutionInfo<'_>,
        object: &JsonObject,
    ) -> PossiblyDeferred<'s, (RawValue<JsonObject>, Timestamp)> {
        let raw = object
            .get(&info.response_key)
            .map_or(RawValue::Missing, |value| raw_from_json(value, &info.field.output));
        PossiblyDeferred::value((raw, self.received_at))
    }

    fn compute_cache_key(&self, object: &JsonObject) -> Option<CacheKey> {
        self.cache_key_fn.as_ref().and_then(|key_fn| key_fn(object))
    }

    fn typename(&self, object: &JsonObject) -> Option<String> {
        object
            .get(TYPENAME_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

// =============================================================================
// CACHE DATA
// =============================================================================

/// Reads stored rows through a read transaction.
///
/// Every field of a row reports the row's `last_received_at`.
pub struct CacheDataSource<C> {
    transaction: TransactionHandle<C>,
}

impl<C> fmt::Debug for CacheDataSource<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheDataSource").finish_non_exhaustive()
    }
}

impl<C: NormalizedCache + 'static> CacheDataSource<C> {
    #[must_use]
    pub const fn new(transaction: TransactionHandle<C>) -> Self {
        Self { transaction }
    }

    /// Shape a stored value by `output`, deferring reference loads.
    ///
    /// Failures inside a list are annotated with the element's path.
    fn raw_from_stored(
        &self,
        value: FieldValue,
        output: &OutputType,
        path: &ResponsePath,
    ) -> PossiblyDeferred<'static, RawValue<RecordRow>> {
        match (output.nullable_inner(), value) {
            (_, FieldValue::Null) => PossiblyDeferred::value(RawValue::Null),
            (OutputType::List(element), FieldValue::List(items)) => {
                let elements = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let element_path = path.appending(index.to_string());
                        self.raw_from_stored(item, element, &element_path)
                            .map_err(move |error| error.at_path(&element_path))
                    })
                    .collect();
                lazily_evaluate_all(elements).map(RawValue::List)
            }
            (OutputType::Object(_), FieldValue::Reference(reference)) => self
                .transaction
                .load_object(&reference.key)
                .map(RawValue::Object),
            (_, other) => PossiblyDeferred::value(RawValue::Leaf(other)),
        }
    }
}

impl<C: NormalizedCache + 'static> ExecutionSource for CacheDataSource<C> {
    type RawObject = RecordRow;

    fn resolve_field<'s>(
        &'s self,
        info: &FieldExecutionInfo<'_>,
        object: &RecordRow,
    ) -> PossiblyDeferred<'s, (RawValue<RecordRow>, Timestamp)> {
        let received_at = object.last_received_at;
        match object.record.get(&info.cache_key_for_field) {
            None => PossiblyDeferred::value((RawValue::Missing, received_at)),
            Some(value) => self
                .raw_from_stored(value.clone(), &info.field.output, &info.response_path)
                .map(move |raw| (raw, received_at)),
        }
    }

    fn compute_cache_key(&self, object: &RecordRow) -> Option<CacheKey> {
        Some(object.record.key.clone())
    }

    fn typename(&self, object: &RecordRow) -> Option<String> {
        match object.record.get(TYPENAME_FIELD) {
            Some(FieldValue::String(typename)) => Some(typename.clone()),
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
