//! # Selection Model
//!
//! The shape an execution walks: fields with arguments and output types,
//! inline fragments guarded by a type condition, and `@include`/`@skip`
//! conditionals.

use crate::operation::Variables;
use crate::types::CacheKey;
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// OUTPUT TYPES
// =============================================================================

/// Built-in GraphQL scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Boolean,
    Id,
}

impl ScalarType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::Id => "ID",
        }
    }
}

/// Output type of a field. Nullable unless wrapped in `NonNull`.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputType {
    Scalar(ScalarType),
    CustomScalar(String),
    Object(SelectionSet),
    List(Box<OutputType>),
    NonNull(Box<OutputType>),
}

impl OutputType {
    #[must_use]
    pub const fn string() -> Self {
        Self::Scalar(ScalarType::String)
    }

    #[must_use]
    pub const fn int() -> Self {
        Self::Scalar(ScalarType::Int)
    }

    #[must_use]
    pub const fn float() -> Self {
        Self::Scalar(ScalarType::Float)
    }

    #[must_use]
    pub const fn boolean() -> Self {
        Self::Scalar(ScalarType::Boolean)
    }

    #[must_use]
    pub const fn id() -> Self {
        Self::Scalar(ScalarType::Id)
    }

    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::CustomScalar(name.into())
    }

    #[must_use]
    pub fn object(selections: impl IntoIterator<Item = Selection>) -> Self {
        Self::Object(SelectionSet::new(selections))
    }

    /// A list of `self`.
    #[must_use]
    pub fn list_of(self) -> Self {
        Self::List(Box::new(self))
    }

    /// `self`, but non-nullable.
    #[must_use]
    pub fn non_null(self) -> Self {
        match self {
            already @ Self::NonNull(_) => already,
            other => Self::NonNull(Box::new(other)),
        }
    }

    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        !matches!(self, Self::NonNull(_))
    }

    /// The type with one level of non-null wrapping removed.
    #[must_use]
    pub fn nullable_inner(&self) -> &Self {
        match self {
            Self::NonNull(inner) => inner,
            other => other,
        }
    }

    /// Innermost type once every list and non-null wrapper is peeled off.
    #[must_use]
    pub fn named_type(&self) -> &Self {
        match self {
            Self::List(inner) | Self::NonNull(inner) => inner.named_type(),
            other => other,
        }
    }

    /// Whether the named type is an object with a selection set.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self.named_type(), Self::Object(_))
    }

    /// Human-readable type name, e.g. `[String!]`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(scalar) => scalar.name().to_string(),
            Self::CustomScalar(name) => name.clone(),
            Self::Object(_) => "Object".to_string(),
            Self::List(inner) => format!("[{}]", inner.describe()),
            Self::NonNull(inner) => format!("{}!", inner.describe()),
        }
    }
}

// =============================================================================
// ARGUMENTS
// =============================================================================

/// A field argument value, possibly referring to operation variables.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Literal(Value),
    Variable(String),
    List(Vec<InputValue>),
    Object(BTreeMap<String, InputValue>),
}

impl InputValue {
    /// Resolve against `variables`. An unset variable resolves to `None`.
    #[must_use]
    pub fn resolve(&self, variables: &Variables) -> Option<Value> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Variable(name) => variables.get(name).cloned(),
            Self::List(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.resolve(variables).unwrap_or(Value::Null))
                    .collect(),
            )),
            Self::Object(fields) => Some(Value::Object(
                fields
                    .iter()
                    .filter_map(|(name, value)| {
                        value.resolve(variables).map(|v| (name.clone(), v))
                    })
                    .collect(),
            )),
        }
    }
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        Self::Literal(Value::String(s.to_string()))
    }
}

/// Compact JSON with object keys sorted, so equal values render equally
/// regardless of insertion order.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(canonical_json).collect::<Vec<_>>().join(",")
        ),
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            format!(
                "{{{}}}",
                sorted
                    .into_iter()
                    .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical_json(v)))
                    .collect::<Vec<_>>()
                    .join(",")
            )
        }
        scalar => scalar.to_string(),
    }
}

// =============================================================================
// SELECTIONS
// =============================================================================

/// A selected field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: BTreeMap<String, InputValue>,
    pub output: OutputType,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, output: OutputType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: BTreeMap::new(),
            output,
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Key of this field in the response: the alias if any, else the name.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Key of this field within its record.
    ///
    /// `name` without arguments, else `name(arg:value,...)` with arguments
    /// in name order. Top-level strings render bare (`hero(episode:JEDI)`);
    /// everything else renders as compact JSON with sorted keys. Arguments
    /// whose variable is unset are left out.
    #[must_use]
    pub fn cache_key(&self, variables: &Variables) -> CacheKey {
        let rendered: Vec<String> = self
            .arguments
            .iter()
            .filter_map(|(name, value)| {
                value.resolve(variables).map(|value| match value {
                    Value::String(s) => format!("{name}:{s}"),
                    other => format!("{name}:{}", canonical_json(&other)),
                })
            })
            .collect();

        if rendered.is_empty() {
            self.name.clone()
        } else {
            format!("{}({})", self.name, rendered.join(","))
        }
    }
}

/// One entry of a selection set.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Field),
    /// Applies when the object's `__typename` equals `type_condition` or is
    /// one of `possible_types`. No type condition means always.
    InlineFragment {
        type_condition: Option<String>,
        possible_types: Vec<String>,
        selections: Vec<Selection>,
    },
    /// `@include(if: $variable)`, or `@skip(if: $variable)` when `inverted`.
    Conditional {
        variable: String,
        inverted: bool,
        selections: Vec<Selection>,
    },
}

impl Selection {
    #[must_use]
    pub fn field(name: impl Into<String>, output: OutputType) -> Self {
        Self::Field(Field::new(name, output))
    }

    #[must_use]
    pub fn on(type_condition: impl Into<String>, selections: impl IntoIterator<Item = Self>) -> Self {
        Self::InlineFragment {
            type_condition: Some(type_condition.into()),
            possible_types: Vec::new(),
            selections: selections.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn include_if(variable: impl Into<String>, selections: impl IntoIterator<Item = Self>) -> Self {
        Self::Conditional {
            variable: variable.into(),
            inverted: false,
            selections: selections.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn skip_if(variable: impl Into<String>, selections: impl IntoIterator<Item = Self>) -> Self {
        Self::Conditional {
            variable: variable.into(),
            inverted: true,
            selections: selections.into_iter().collect(),
        }
    }
}

impl From<Field> for Selection {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

/// An ordered list of selections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
}

impl SelectionSet {
    #[must_use]
    pub fn new(selections: impl IntoIterator<Item = Selection>) -> Self {
        Self {
            selections: selections.into_iter().collect(),
        }
    }
}

// =============================================================================
// FIELD COLLECTION
// =============================================================================

/// Fields sharing one response key, in selection order.
#[derive(Debug, Clone)]
pub struct FieldGroup<'s> {
    pub response_key: String,
    pub fields: Vec<&'s Field>,
}

impl<'s> FieldGroup<'s> {
    /// The field whose name, arguments and type stand for the group.
    #[must_use]
    pub fn field(&self) -> &'s Field {
        self.fields[0]
    }

    /// Sub-selections of every field in the group, merged in order.
    #[must_use]
    pub fn sub_selections(&self) -> Vec<&'s Selection> {
        self.fields
            .iter()
            .filter_map(|field| match field.output.named_type() {
                OutputType::Object(set) => Some(set.selections.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// Group the fields that apply to an object of type `typename`.
///
/// Fragments whose condition does not match, and conditionals whose
/// variable says no, are skipped. Groups keep the order of first
/// occurrence.
pub fn collect_fields<'s>(
    selections: impl IntoIterator<Item = &'s Selection>,
    typename: Option<&str>,
    variables: &Variables,
    groups: &mut Vec<FieldGroup<'s>>,
) {
    for selection in selections {
        match selection {
            Selection::Field(field) => {
                let key = field.response_key();
                match groups.iter_mut().find(|group| group.response_key == key) {
                    Some(group) => group.fields.push(field),
                    None => groups.push(FieldGroup {
                        response_key: key.to_string(),
                        fields: vec![field],
                    }),
                }
            }
            Selection::InlineFragment {
                type_condition,
                possible_types,
                selections,
            } => {
                let applies = match (type_condition, typename) {
                    (None, _) => true,
                    (Some(condition), Some(typename)) => {
                        condition == typename || possible_types.iter().any(|t| t == typename)
                    }
                    (Some(_), None) => false,
                };
                if applies {
                    collect_fields(selections, typename, variables, groups);
                }
            }
            Selection::Conditional {
                variable,
                inverted,
                selections,
            } => {
                let flag = variables
                    .get(variable)
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if flag != *inverted {
                    collect_fields(selections, typename, variables, groups);
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
