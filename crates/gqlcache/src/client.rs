//! # Cache Client
//!
//! Runs fetches: the cache stage, the policy decision, then the network
//! stage. Results arrive in order on a [`FetchHandle`]; a cache result is
//! always delivered before the network result of the same fetch.
//!
//! Network results are written back to the store, notifying its
//! subscribers, for every policy except `NetworkOnly`.

use crate::error::FetchError;
use crate::interceptor::CacheReadInterceptor;
use crate::network::NetworkStage;
use gqlcache_core::{
    CacheConfig, CacheError, CachePolicy, CacheStore, GraphQLResponse, GraphQLResult, Operation,
    PolicyConfig,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

// =============================================================================
// FETCH HANDLE
// =============================================================================

/// Ordered results of one fetch.
///
/// The stream ends once the fetch is done, fails, or is cancelled.
#[derive(Debug)]
pub struct FetchHandle {
    receiver: mpsc::UnboundedReceiver<Result<GraphQLResult, FetchError>>,
    cancelled: Arc<AtomicBool>,
}

impl FetchHandle {
    /// The next result, or `None` once the fetch has finished.
    pub async fn next(&mut self) -> Option<Result<GraphQLResult, FetchError>> {
        self.receiver.recv().await
    }

    /// Stop delivering results. A stage already running completes, but its
    /// result is dropped.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Sending half of a fetch, checking cancellation before every delivery.
struct Delivery {
    sender: mpsc::UnboundedSender<Result<GraphQLResult, FetchError>>,
    cancelled: Arc<AtomicBool>,
    operation: String,
}

impl Delivery {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns whether the result was delivered.
    fn deliver(&self, result: Result<GraphQLResult, FetchError>) -> bool {
        if self.is_cancelled() {
            debug!(operation = %self.operation, "fetch cancelled, dropping result");
            return false;
        }
        self.sender.send(result).is_ok()
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Arbitrates between a store and a network stage.
pub struct CacheClient<N> {
    store: CacheStore,
    network: Arc<N>,
    interceptor: CacheReadInterceptor,
    policy: PolicyConfig,
}

impl<N> Clone for CacheClient<N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            network: Arc::clone(&self.network),
            interceptor: self.interceptor.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<N> std::fmt::Debug for CacheClient<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("store", &self.store)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<N: NetworkStage> CacheClient<N> {
    #[must_use]
    pub fn new(store: CacheStore, network: N) -> Self {
        Self {
            interceptor: CacheReadInterceptor::new(store.clone()),
            store,
            network: Arc::new(network),
            policy: PolicyConfig::default(),
        }
    }

    /// A client over the store `config` describes.
    pub fn from_config(config: &CacheConfig, network: N) -> Result<Self, CacheError> {
        Ok(Self::new(config.open_store()?, network).with_policy_config(config.policy.clone()))
    }

    /// Default policy and TTL for fetches.
    #[must_use]
    pub fn with_policy_config(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &CacheStore {
        &self.store
    }

    #[must_use]
    pub const fn default_policy(&self) -> CachePolicy {
        self.policy.default
    }

    /// Fetch `operation` with the configured default policy.
    pub fn fetch_default(&self, operation: Operation) -> FetchHandle {
        self.fetch(operation, self.policy.default)
    }

    /// Start fetching `operation` under `policy`. Must be called from
    /// within a tokio runtime.
    ///
    /// Mutations and subscriptions never read the cache; a cache-reading
    /// policy becomes `NetworkThenCache` for them.
    pub fn fetch(&self, operation: Operation, policy: CachePolicy) -> FetchHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        let delivery = Delivery {
            sender,
            cancelled: Arc::clone(&cancelled),
            operation: operation.name.clone(),
        };
        let policy = policy.for_operation(operation.operation_type);
        let ttl_seconds = self.policy.ttl_for(&operation);
        let client = self.clone();

        tokio::spawn(async move {
            client
                .run(Arc::new(operation), policy, ttl_seconds, delivery)
                .await;
        });

        FetchHandle {
            receiver,
            cancelled,
        }
    }

    async fn run(
        &self,
        operation: Arc<Operation>,
        policy: CachePolicy,
        ttl_seconds: Option<i64>,
        delivery: Delivery,
    ) {
        let read = match self
            .interceptor
            .read(Arc::clone(&operation), policy, ttl_seconds)
            .await
        {
            Ok(read) => read,
            Err(error) => {
                delivery.deliver(Err(error));
                return;
            }
        };

        if let Some(failure) = read.failure(operation.root_key()) {
            delivery.deliver(Err(failure.into()));
            return;
        }
        let decision = read.decision;
        if let Some(result) = read.result.filter(|_| decision.deliver_cache) {
            if !delivery.deliver(Ok(result)) {
                return;
            }
        }
        if !decision.proceed_to_network || delivery.is_cancelled() {
            return;
        }

        let body = match self.network.fetch(&operation).await {
            Ok(body) => body,
            Err(error) => {
                delivery.deliver(Err(error));
                return;
            }
        };
        if delivery.is_cancelled() {
            debug!(operation = %operation.name, "fetch cancelled before parsing");
            return;
        }

        let store = self.store.clone();
        let parsed =
            tokio::task::spawn_blocking(move || parse_and_publish(&store, &operation, body, policy))
                .await;
        let result = match parsed {
            Ok(result) => result.map_err(FetchError::from),
            Err(error) => Err(error.into()),
        };
        delivery.deliver(result);
    }
}

/// Parse a network body and merge its records unless `policy` says not to.
fn parse_and_publish(
    store: &CacheStore,
    operation: &Operation,
    body: Value,
    policy: CachePolicy,
) -> Result<GraphQLResult, CacheError> {
    let response =
        GraphQLResponse::from_value(operation, body)?.with_cache_key_fn(store.cache_key_fn().cloned());
    let (result, records) = response.parse_result(policy)?;
    if let Some(records) = records {
        let changed = store.publish(records)?;
        debug!(
            operation = %operation.name,
            changed = changed.len(),
            "published network result"
        );
    }
    Ok(result)
}
