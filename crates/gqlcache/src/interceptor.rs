//! # Cache Read Interceptor
//!
//! The cache stage of a fetch. Reads the operation from the store on the
//! blocking pool, grades the result against its TTL, and asks the policy
//! engine what happens next.

use crate::error::FetchError;
use gqlcache_core::{
    CacheError, CacheOutcome, CachePolicy, CacheStore, Freshness, GraphQLResult, Operation,
    PolicyDecision, PolicyFailure, Timestamp, decide,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the cache stage found, and the decision taken on it.
#[derive(Debug)]
pub struct CacheRead {
    pub outcome: CacheOutcome,
    pub freshness: Freshness,
    pub decision: PolicyDecision,
    /// The cached result, on a hit.
    pub result: Option<GraphQLResult>,
    /// Why the read missed, when it did.
    pub miss: Option<CacheError>,
}

impl CacheRead {
    /// The error a `fail_with` decision reports.
    #[must_use]
    pub fn failure(&self, root_key: &str) -> Option<CacheError> {
        self.decision.fail_with.map(|failure| match failure {
            PolicyFailure::StaleData => CacheError::StaleData,
            PolicyFailure::CacheMiss => self
                .miss
                .clone()
                .unwrap_or_else(|| CacheError::CacheMiss(root_key.to_string())),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CacheReadInterceptor {
    store: CacheStore,
}

impl CacheReadInterceptor {
    #[must_use]
    pub const fn new(store: CacheStore) -> Self {
        Self { store }
    }

    /// Run the cache stage of `operation` under `policy`.
    ///
    /// Any failed read counts as a miss; the failure is kept so a
    /// cache-only read can report it.
    pub async fn read(
        &self,
        operation: Arc<Operation>,
        policy: CachePolicy,
        ttl_seconds: Option<i64>,
    ) -> Result<CacheRead, FetchError> {
        let (outcome, result, miss) = if policy.reads_cache() {
            let store = self.store.clone();
            let loaded = {
                let operation = Arc::clone(&operation);
                tokio::task::spawn_blocking(move || store.load(&operation)).await?
            };
            match loaded {
                Ok(result) => (CacheOutcome::Hit, Some(result), None),
                Err(error) => (CacheOutcome::Miss, None, Some(error)),
            }
        } else {
            (CacheOutcome::NotRead, None, None)
        };

        let freshness = result.as_ref().map_or(Freshness::Fresh, |result| {
            Freshness::evaluate(result.metadata.max_age, ttl_seconds, Timestamp::now())
        });
        let decision = decide(policy, outcome, freshness);

        debug!(
            operation = %operation.name,
            ?policy,
            ?outcome,
            ?freshness,
            ?decision,
            "cache read decided"
        );
        if decision.proceed_to_network {
            match (&outcome, &miss) {
                (CacheOutcome::Miss, Some(error)) => {
                    warn!(operation = %operation.name, %error, "cache miss, fetching from network");
                }
                (CacheOutcome::Hit, _) if freshness == Freshness::Stale => {
                    warn!(operation = %operation.name, "stale cache data, fetching from network");
                }
                _ => {}
            }
        }

        Ok(CacheRead {
            outcome,
            freshness,
            decision,
            result,
            miss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlcache_core::{
        CacheReference, FieldValue, Fields, OutputType, Record, RecordRow, Selection, SelectionSet,
    };

    fn greeting_query() -> Operation {
        Operation::query(
            "Greeting",
            SelectionSet::new([Selection::field("greeting", OutputType::string())]),
        )
    }

    fn seeded(received_at: i64) -> CacheStore {
        let store = CacheStore::default();
        store
            .import_rows(vec![RecordRow::new(
                Record::new("QUERY_ROOT", Fields::new()).with_field("greeting", "hi"),
                Timestamp(received_at),
            )])
            .expect("seed");
        store
    }

    #[tokio::test]
    async fn fresh_hit_is_delivered() {
        let interceptor = CacheReadInterceptor::new(seeded(Timestamp::now().secs()));
        let read = interceptor
            .read(Arc::new(greeting_query()), CachePolicy::CacheElseNetwork, Some(60))
            .await
            .expect("read");

        assert_eq!(read.outcome, CacheOutcome::Hit);
        assert_eq!(read.freshness, Freshness::Fresh);
        assert!(read.decision.deliver_cache);
        assert!(!read.decision.proceed_to_network);
        assert!(read.failure("QUERY_ROOT").is_none());
    }

    #[tokio::test]
    async fn stale_hit_fails_cache_only() {
        let interceptor = CacheReadInterceptor::new(seeded(0));
        let read = interceptor
            .read(Arc::new(greeting_query()), CachePolicy::CacheOnly, Some(60))
            .await
            .expect("read");

        assert_eq!(read.freshness, Freshness::Stale);
        assert_eq!(read.failure("QUERY_ROOT"), Some(CacheError::StaleData));
    }

    #[tokio::test]
    async fn miss_reports_underlying_error() {
        let store = CacheStore::default();
        store
            .import_rows(vec![RecordRow::new(
                Record::new("QUERY_ROOT", Fields::new())
                    .with_field("hero", FieldValue::Reference(CacheReference::new("hero"))),
                Timestamp(0),
            )])
            .expect("seed");
        let operation = Operation::query(
            "Hero",
            SelectionSet::new([Selection::field(
                "hero",
                OutputType::object([Selection::field("name", OutputType::string())]),
            )]),
        );

        let read = CacheReadInterceptor::new(store)
            .read(Arc::new(operation), CachePolicy::CacheOnly, None)
            .await
            .expect("read");

        assert_eq!(read.outcome, CacheOutcome::Miss);
        let failure = read.failure("QUERY_ROOT").expect("failure");
        assert_eq!(failure.underlying(), &CacheError::CacheMiss("hero".to_string()));
    }

    #[tokio::test]
    async fn network_policies_skip_the_read() {
        let interceptor = CacheReadInterceptor::new(seeded(0));
        let read = interceptor
            .read(Arc::new(greeting_query()), CachePolicy::NetworkOnly, Some(60))
            .await
            .expect("read");

        assert_eq!(read.outcome, CacheOutcome::NotRead);
        assert!(read.result.is_none());
        assert!(read.decision.proceed_to_network);
    }
}
