//! # Responses and Results
//!
//! `GraphQLResponse` wraps a server response body for one operation and
//! parses it in a single execution pass into:
//! - typed data (as JSON, decodable with `GraphQLResult::data_as`)
//! - the `RecordSet` to merge into the store
//! - the cache keys the result depends on
//! - freshness metadata
//!
//! `errors` and `extensions` are surfaced unchanged. A body without `data`
//! (or with `data: null`) yields no data and nothing to merge.

use crate::execution::source::JsonObject;
use crate::execution::{
    CacheKeyFn, DependencyTracker, FirstReceivedAtTracker, GraphQLExecutor, NetworkResponseSource,
    ResultMetadata, ResultNormalizer, SelectionSetMapper,
};
use crate::operation::Operation;
use crate::policy::CachePolicy;
use crate::record_set::RecordSet;
use crate::types::{CacheError, CacheKey, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// RESULT
// =============================================================================

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Cache,
    Server,
}

/// A location in the operation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// An entry of a response's `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<SourceLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<JsonObject>,
}

/// The outcome of reading an operation, from the cache or the server.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLResult {
    pub data: Option<Value>,
    pub errors: Option<Vec<GraphQLError>>,
    pub extensions: Option<JsonObject>,
    pub source: ResultSource,
    /// Cache keys the data was read from or written to.
    pub dependent_keys: Option<BTreeSet<CacheKey>>,
    pub metadata: ResultMetadata,
}

impl GraphQLResult {
    /// A result read from the cache.
    #[must_use]
    pub fn from_cache(data: JsonObject, dependent_keys: BTreeSet<CacheKey>, metadata: ResultMetadata) -> Self {
        Self {
            data: Some(Value::Object(data)),
            errors: None,
            extensions: None,
            source: ResultSource::Cache,
            dependent_keys: Some(dependent_keys),
            metadata,
        }
    }

    /// Decode `data` into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, CacheError> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| CacheError::Decode("result has no data".to_string()))?;
        T::deserialize(data).map_err(|e| CacheError::Decode(e.to_string()))
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

/// A server response body for `operation`.
#[derive(Clone)]
pub struct GraphQLResponse<'o> {
    operation: &'o Operation,
    body: JsonObject,
    received_at: Timestamp,
    cache_key_fn: Option<CacheKeyFn>,
}

impl fmt::Debug for GraphQLResponse<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphQLResponse")
            .field("operation", &self.operation.name)
            .field("received_at", &self.received_at)
            .finish_non_exhaustive()
    }
}

impl<'o> GraphQLResponse<'o> {
    /// A response received now.
    #[must_use]
    pub fn new(operation: &'o Operation, body: JsonObject) -> Self {
        Self {
            operation,
            body,
            received_at: Timestamp::now(),
            cache_key_fn: None,
        }
    }

    /// A response from any JSON value; the body must be an object.
    pub fn from_value(operation: &'o Operation, body: Value) -> Result<Self, CacheError> {
        match body {
            Value::Object(body) => Ok(Self::new(operation, body)),
            other => Err(CacheError::Decode(format!(
                "response body must be an object, found {other}"
            ))),
        }
    }

    #[must_use]
    pub const fn with_received_at(mut self, received_at: Timestamp) -> Self {
        self.received_at = received_at;
        self
    }

    #[must_use]
    pub fn with_cache_key_fn(mut self, cache_key_fn: Option<CacheKeyFn>) -> Self {
        self.cache_key_fn = cache_key_fn;
        self
    }

    #[must_use]
    pub const fn received_at(&self) -> Timestamp {
        self.received_at
    }

    fn errors(&self) -> Result<Option<Vec<GraphQLError>>, CacheError> {
        match self.body.get("errors") {
            None | Some(Value::Null) => Ok(None),
            Some(errors) => Vec::<GraphQLError>::deserialize(errors)
                .map(Some)
                .map_err(|e| CacheError::Decode(format!("invalid errors: {e}"))),
        }
    }

    fn extensions(&self) -> Option<JsonObject> {
        match self.body.get("extensions") {
            Some(Value::Object(extensions)) => Some(extensions.clone()),
            _ => None,
        }
    }

    fn data(&self) -> Result<Option<&JsonObject>, CacheError> {
        match self.body.get("data") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(data)) => Ok(Some(data)),
            Some(other) => Err(CacheError::Decode(format!("data must be an object, found {other}"))),
        }
    }

    fn executor(&self) -> GraphQLExecutor<NetworkResponseSource> {
        GraphQLExecutor::new(
            NetworkResponseSource::new(self.received_at).with_cache_key_fn(self.cache_key_fn.clone()),
        )
    }

    fn server_result(&self, data: Option<JsonObject>, dependent_keys: Option<BTreeSet<CacheKey>>, metadata: ResultMetadata) -> Result<GraphQLResult, CacheError> {
        Ok(GraphQLResult {
            data: data.map(Value::Object),
            errors: self.errors()?,
            extensions: self.extensions(),
            source: ResultSource::Server,
            dependent_keys,
            metadata,
        })
    }

    /// Parse the response, also producing the records to merge unless
    /// `policy` keeps results out of the cache.
    pub fn parse_result(&self, policy: CachePolicy) -> Result<(GraphQLResult, Option<RecordSet>), CacheError> {
        if !policy.writes_cache() {
            return Ok((self.parse_result_fast()?, None));
        }

        let Some(data) = self.data()? else {
            let result = self.server_result(None, None, ResultMetadata::default())?;
            return Ok((result, None));
        };

        let operation = self.operation;
        let (mapped, records, dependent_keys, metadata) = self.executor().execute(
            &operation.selection_set,
            data,
            operation.root_key(),
            &operation.variables,
            (
                SelectionSetMapper::new(),
                ResultNormalizer::new(self.received_at),
                DependencyTracker::new(),
                FirstReceivedAtTracker::new(),
            ),
        )?;

        let result = self.server_result(Some(mapped), Some(dependent_keys), metadata)?;
        Ok((result, Some(records)))
    }

    /// Parse the response into data only.
    pub fn parse_result_fast(&self) -> Result<GraphQLResult, CacheError> {
        let Some(data) = self.data()? else {
            return self.server_result(None, None, ResultMetadata::default());
        };

        let operation = self.operation;
        let mapped = self.executor().execute(
            &operation.selection_set,
            data,
            operation.root_key(),
            &operation.variables,
            SelectionSetMapper::new(),
        )?;

        let metadata = ResultMetadata {
            max_age: self.received_at,
        };
        self.server_result(Some(mapped), None, metadata)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{OutputType, Selection, SelectionSet, identity_key_fn};
    use crate::types::{CacheReference, FieldValue};
    use serde_json::json;

    fn hero_query() -> Operation {
        Operation::query(
            "HeroName",
            SelectionSet::new([Selection::field(
                "hero",
                OutputType::object([
                    Selection::field("__typename", OutputType::string().non_null()),
                    Selection::field("id", OutputType::id().non_null()),
                    Selection::field("name", OutputType::string().non_null()),
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

    #[test]
    fn parse_result_normalizes_and_tracks() {
        let operation = hero_query();
        let response = GraphQLResponse::new(
            &operation,
            body(json!({"data": {"hero": {"__typename": "Droid", "id": "2001", "name": "R2-D2"}}})),
        )
        .with_received_at(Timestamp(500));

        let (result, records) = response
            .parse_result(CachePolicy::CacheElseNetwork)
            .expect("parse");

        assert_eq!(result.source, ResultSource::Server);
        assert_eq!(
            result.data,
            Some(json!({"hero": {"__typename": "Droid", "id": "2001", "name": "R2-D2"}}))
        );
        assert_eq!(result.metadata.max_age, Timestamp(500));

        let records = records.expect("records");
        let root = records.get("QUERY_ROOT").expect("root record");
        assert_eq!(
            root.record.get("hero"),
            Some(&FieldValue::Reference(CacheReference::new("QUERY_ROOT.hero")))
        );
        let hero = records.get("QUERY_ROOT.hero").expect("hero record");
        assert_eq!(hero.record.get("name"), Some(&FieldValue::from("R2-D2")));
        assert_eq!(hero.last_received_at, Timestamp(500));

        let dependent_keys = result.dependent_keys.expect("dependent keys");
        assert!(dependent_keys.contains("QUERY_ROOT.hero"));
        assert!(dependent_keys.contains("QUERY_ROOT.hero.name"));
    }

    #[test]
    fn identity_keys_replace_paths() {
        let operation = hero_query();
        let response = GraphQLResponse::new(
            &operation,
            body(json!({"data": {"hero": {"__typename": "Droid", "id": "2001", "name": "R2-D2"}}})),
        )
        .with_cache_key_fn(Some(identity_key_fn("id")));

        let (_, records) = response
            .parse_result(CachePolicy::NetworkThenCache)
            .expect("parse");
        let records = records.expect("records");
        assert!(records.contains_key("2001"));
        assert_eq!(
            records.get("QUERY_ROOT").and_then(|row| row.record.get("hero")),
            Some(&FieldValue::Reference(CacheReference::new("2001")))
        );
    }

    #[test]
    fn network_only_takes_the_fast_path() {
        let operation = hero_query();
        let response = GraphQLResponse::new(
            &operation,
            body(json!({"data": {"hero": {"__typename": "Droid", "id": "2001", "name": "R2-D2"}}})),
        );
        let (result, records) = response.parse_result(CachePolicy::NetworkOnly).expect("parse");
        assert!(records.is_none());
        assert!(result.dependent_keys.is_none());
        assert!(result.data.is_some());
    }

    #[test]
    fn missing_data_yields_no_records() {
        let operation = hero_query();
        let response = GraphQLResponse::from_value(
            &operation,
            json!({
                "errors": [{"message": "Boom", "path": ["hero"], "locations": [{"line": 1, "column": 2}]}],
                "extensions": {"cost": 3}
            }),
        )
        .expect("object body");

        let (result, records) = response
            .parse_result(CachePolicy::CacheElseNetwork)
            .expect("parse");
        assert!(records.is_none());
        assert!(result.data.is_none());

        let errors = result.errors.expect("errors");
        assert_eq!(errors[0].message, "Boom");
        assert_eq!(errors[0].path, Some(vec![json!("hero")]));
        assert_eq!(errors[0].locations, Some(vec![SourceLocation { line: 1, column: 2 }]));
        assert_eq!(result.extensions.and_then(|e| e.get("cost").cloned()), Some(json!(3)));
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        let operation = hero_query();
        assert!(GraphQLResponse::from_value(&operation, json!([1])).is_err());

        let response = GraphQLResponse::new(&operation, body(json!({"data": 5})));
        assert!(matches!(
            response.parse_result(CachePolicy::CacheElseNetwork),
            Err(CacheError::Decode(_))
        ));
    }

    #[test]
    fn type_mismatch_in_response_fails_parsing() {
        let operation = hero_query();
        let response = GraphQLResponse::new(
            &operation,
            body(json!({"data": {"hero": {"__typename": "Droid", "id": "2001", "name": 7}}})),
        );
        let err = response
            .parse_result(CachePolicy::CacheElseNetwork)
            .expect_err("must fail");
        assert_eq!(err.path().map(|p| p.joined()), Some("hero.name".to_string()));
    }

    #[test]
    fn data_as_decodes_typed_values() {
        #[derive(Deserialize)]
        struct Data {
            hero: Hero,
        }
        #[derive(Deserialize)]
        struct Hero {
            name: String,
        }

        let operation = hero_query();
        let response = GraphQLResponse::new(
            &operation,
            body(json!({"data": {"hero": {"__typename": "Droid", "id": "2001", "name": "R2-D2"}}})),
        );
        let result = response.parse_result_fast().expect("parse");
        let data: Data = result.data_as().expect("decode");
        assert_eq!(data.hero.name, "R2-D2");

        let empty = GraphQLResult {
            data: None,
            ..result
        };
        assert!(matches!(empty.data_as::<Data>(), Err(CacheError::Decode(_))));
    }
}
