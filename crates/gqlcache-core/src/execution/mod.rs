//! # Execution Engine
//!
//! One tree walk evaluates a selection set against a data source. The walk
//! is parameterized by two roles:
//!
//! - An [`ExecutionSource`] supplies raw field values: a live JSON response
//!   ([`NetworkResponseSource`]) or stored records read through a
//!   transaction ([`CacheDataSource`]).
//! - A [`ResultAccumulator`] receives the walk's events bottom-up and builds
//!   one derived result. Tuples of accumulators run in the same pass.
//!
//! ## Event Order
//!
//! For every field: the source resolves the raw value, the value is
//! completed (scalar, custom scalar, null, missing, list of completed
//! elements, or child object), then the completed value becomes a field
//! entry. Once every field of an object is done, the entries become the
//! object result. The root object result is handed to `finish`.
//!
//! ## Errors
//!
//! Any error is annotated with the response path of the field (or list
//! element) where it happened, and aborts the walk. There is no partial
//! success.

pub mod accumulator;
pub mod deferred;
pub mod dependency;
pub mod freshness;
pub mod mapper;
pub mod normalizer;
pub mod selection;
pub mod source;

pub use accumulator::ResultAccumulator;
pub use deferred::{PossiblyDeferred, lazily_evaluate_all};
pub use dependency::DependencyTracker;
pub use freshness::{FirstReceivedAtTracker, ResultMetadata};
pub use mapper::{HandleMissingValues, SelectionSetMapper};
pub use normalizer::ResultNormalizer;
pub use selection::{
    Field, FieldGroup, InputValue, OutputType, ScalarType, Selection, SelectionSet,
    collect_fields,
};
pub use source::{
    CacheDataSource, CacheKeyFn, ExecutionSource, JsonObject, NetworkResponseSource, RawValue,
    identity_key_fn,
};

use crate::operation::Variables;
use crate::types::{CacheError, CacheKey, CachePath, KeyPath, ResponsePath, Timestamp};

// =============================================================================
// EXECUTION INFO
// =============================================================================

/// Where the walk is while processing one field (or one list element of it).
#[derive(Debug, Clone)]
pub struct FieldExecutionInfo<'s> {
    /// The field standing for its response-key group.
    pub field: &'s Field,
    pub response_key: String,
    /// Key of the field within its record, arguments included.
    pub cache_key_for_field: CacheKey,
    pub response_path: ResponsePath,
    pub cache_path: CachePath,
}

impl FieldExecutionInfo<'_> {
    /// Info for element `index` of this field's list value.
    #[must_use]
    pub fn for_element(&self, index: usize) -> Self {
        let segment = index.to_string();
        Self {
            field: self.field,
            response_key: self.response_key.clone(),
            cache_key_for_field: self.cache_key_for_field.clone(),
            response_path: self.response_path.appending(segment.clone()),
            cache_path: self.cache_path.appending(segment),
        }
    }
}

/// Where the walk is while processing one object.
#[derive(Debug, Clone)]
pub struct ObjectExecutionInfo {
    pub response_path: ResponsePath,
    /// Rooted at the object's own key when it has one, else at the nearest
    /// keyed ancestor.
    pub cache_path: CachePath,
    /// Identity key, when computed.
    pub cache_key: Option<CacheKey>,
}

impl ObjectExecutionInfo {
    /// Info for the root object stored under `root_key`.
    #[must_use]
    pub fn root(root_key: &str) -> Self {
        Self {
            response_path: KeyPath::root(),
            cache_path: KeyPath::from_key(root_key),
            cache_key: Some(root_key.to_string()),
        }
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// Walks selection sets against one execution source.
pub struct GraphQLExecutor<S> {
    source: S,
}

impl<S: ExecutionSource> GraphQLExecutor<S> {
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Execute `selection_set` on `object`, the root stored under `root_key`.
    pub fn execute<A: ResultAccumulator>(
        &self,
        selection_set: &SelectionSet,
        object: &S::RawObject,
        root_key: &str,
        variables: &Variables,
        mut accumulator: A,
    ) -> Result<A::FinalResult, CacheError> {
        let walk = Walk {
            source: &self.source,
            variables,
            compute_cache_keys: accumulator.requires_cache_key_computation(),
        };
        let info = ObjectExecutionInfo::root(root_key);
        let selections: Vec<&Selection> = selection_set.selections.iter().collect();

        let root = walk.execute_object(&mut accumulator, &selections, object, &info)?;
        accumulator.finish(root, &info)
    }
}

/// State shared by one execution.
struct Walk<'e, S> {
    source: &'e S,
    variables: &'e Variables,
    compute_cache_keys: bool,
}

impl<S: ExecutionSource> Walk<'_, S> {
    fn execute_object<'s, A: ResultAccumulator>(
        &self,
        accumulator: &mut A,
        selections: &[&'s Selection],
        object: &S::RawObject,
        info: &ObjectExecutionInfo,
    ) -> Result<A::ObjectResult, CacheError> {
        let typename = self.source.typename(object);
        let mut groups: Vec<FieldGroup<'s>> = Vec::new();
        collect_fields(
            selections.iter().copied(),
            typename.as_deref(),
            self.variables,
            &mut groups,
        );

        let mut entries = Vec::with_capacity(groups.len());
        for group in &groups {
            if let Some(entry) = self.execute_field(accumulator, group, object, info)? {
                entries.push(entry);
            }
        }
        accumulator.accept_field_entries(entries, info)
    }

    fn execute_field<'s, A: ResultAccumulator>(
        &self,
        accumulator: &mut A,
        group: &FieldGroup<'s>,
        object: &S::RawObject,
        object_info: &ObjectExecutionInfo,
    ) -> Result<Option<A::FieldEntry>, CacheError> {
        let field = group.field();
        let cache_key_for_field = field.cache_key(self.variables);
        let info = FieldExecutionInfo {
            field,
            response_key: group.response_key.clone(),
            response_path: object_info.response_path.appending(group.response_key.clone()),
            cache_path: object_info.cache_path.appending(cache_key_for_field.clone()),
            cache_key_for_field,
        };

        self.resolve_and_complete(accumulator, group, object, &info)
            .map_err(|error| error.at_path(&info.response_path))
    }

    fn resolve_and_complete<'s, A: ResultAccumulator>(
        &self,
        accumulator: &mut A,
        group: &FieldGroup<'s>,
        object: &S::RawObject,
        info: &FieldExecutionInfo<'s>,
    ) -> Result<Option<A::FieldEntry>, CacheError> {
        let (raw, received_at) = self.source.resolve_field(info, object).get()?;
        let completed =
            self.complete_value(accumulator, group, info, &info.field.output, raw, received_at)?;
        accumulator.accept_field_entry(completed, info)
    }

    fn complete_value<'s, A: ResultAccumulator>(
        &self,
        accumulator: &mut A,
        group: &FieldGroup<'s>,
        info: &FieldExecutionInfo<'s>,
        output: &OutputType,
        raw: RawValue<S::RawObject>,
        received_at: Timestamp,
    ) -> Result<A::PartialResult, CacheError> {
        match raw {
            RawValue::Missing => accumulator.accept_missing(received_at, info),
            RawValue::Null if output.is_nullable() => accumulator.accept_null(received_at, info),
            RawValue::Null => Err(CacheError::NullFieldValue),
            raw => match (output.nullable_inner(), raw) {
                (OutputType::List(element_type), RawValue::List(items)) => {
                    let mut completed = Vec::with_capacity(items.len());
                    for (index, item) in items.into_iter().enumerate() {
                        let element_info = info.for_element(index);
                        let value = self
                            .complete_value(
                                accumulator,
                                group,
                                &element_info,
                                element_type,
                                item,
                                received_at,
                            )
                            .map_err(|error| error.at_path(&element_info.response_path))?;
                        completed.push(value);
                    }
                    accumulator.accept_list(completed, info)
                }
                (OutputType::Object(_), RawValue::Object(child)) => {
                    let child_info = self.object_info(info, &child);
                    let selections = group.sub_selections();
                    let result =
                        self.execute_object(accumulator, &selections, &child, &child_info)?;
                    accumulator.accept_child_object(result, received_at, info)
                }
                (OutputType::Scalar(_), RawValue::Leaf(value)) => {
                    accumulator.accept_scalar(&value, received_at, info)
                }
                (OutputType::CustomScalar(_), RawValue::Leaf(value)) => {
                    accumulator.accept_custom_scalar(&value, received_at, info)
                }
                (expected, found) => Err(CacheError::TypeMismatch {
                    expected: expected.describe(),
                    found: found.kind().to_string(),
                }),
            },
        }
    }

    /// Execution info for a child object, computing its key once if any
    /// accumulator needs it.
    fn object_info(&self, field: &FieldExecutionInfo<'_>, object: &S::RawObject) -> ObjectExecutionInfo {
        let cache_key = if self.compute_cache_keys {
            self.source.compute_cache_key(object)
        } else {
            None
        };
        let cache_path = match &cache_key {
            Some(key) => KeyPath::from_key(key.clone()),
            None => field.cache_path.clone(),
        };
        ObjectExecutionInfo {
            response_path: field.response_path.clone(),
            cache_path,
            cache_key,
        }
    }
}
