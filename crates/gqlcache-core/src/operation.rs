//! # Operations
//!
//! An operation is what a caller reads or writes through the cache: its
//! kind (which decides the root record), its root selection set, the
//! variables its field arguments refer to, and an optional response TTL.

use crate::execution::selection::SelectionSet;
use crate::primitives::{MUTATION_ROOT, QUERY_ROOT, SUBSCRIPTION_ROOT};
use serde::{Deserialize, Serialize};

/// Variable values of an operation.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// Kind of GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    /// Synthetic key of the record holding this operation's root object.
    #[must_use]
    pub const fn root_key(self) -> &'static str {
        match self {
            Self::Query => QUERY_ROOT,
            Self::Mutation => MUTATION_ROOT,
            Self::Subscription => SUBSCRIPTION_ROOT,
        }
    }
}

/// A GraphQL operation as seen by the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: String,
    pub operation_type: OperationType,
    pub selection_set: SelectionSet,
    pub variables: Variables,
    /// Maximum acceptable age of cached data, in seconds. `None` means any
    /// age is acceptable.
    pub response_cache_ttl: Option<i64>,
}

impl Operation {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        operation_type: OperationType,
        selection_set: SelectionSet,
    ) -> Self {
        Self {
            name: name.into(),
            operation_type,
            selection_set,
            variables: Variables::new(),
            response_cache_ttl: None,
        }
    }

    #[must_use]
    pub fn query(name: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self::new(name, OperationType::Query, selection_set)
    }

    #[must_use]
    pub fn mutation(name: impl Into<String>, selection_set: SelectionSet) -> Self {
        Self::new(name, OperationType::Mutation, selection_set)
    }

    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, seconds: i64) -> Self {
        self.response_cache_ttl = Some(seconds);
        self
    }

    #[must_use]
    pub const fn root_key(&self) -> &'static str {
        self.operation_type.root_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_keys_follow_operation_type() {
        assert_eq!(OperationType::Query.root_key(), "QUERY_ROOT");
        assert_eq!(OperationType::Mutation.root_key(), "MUTATION_ROOT");
        assert_eq!(OperationType::Subscription.root_key(), "SUBSCRIPTION_ROOT");
    }

    #[test]
    fn builder_collects_variables_and_ttl() {
        let op = Operation::query("HeroName", SelectionSet::default())
            .with_variable("episode", serde_json::json!("JEDI"))
            .with_ttl(300);

        assert_eq!(op.root_key(), "QUERY_ROOT");
        assert_eq!(op.variables.get("episode"), Some(&serde_json::json!("JEDI")));
        assert_eq!(op.response_cache_ttl, Some(300));
    }
}
