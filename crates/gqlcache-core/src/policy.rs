//! # Policy Engine
//!
//! Decides, per read, whether the cache result is delivered, whether the
//! network is consulted, and whether the read fails.
//!
//! `decide` is a pure function of `(policy, outcome, freshness)`. It never
//! performs I/O; the caller executes the decision.
//!
//! | policy                     | hit + fresh        | hit + stale     | miss            |
//! |----------------------------|--------------------|-----------------|-----------------|
//! | `NetworkOnly`              | network            | network         | network         |
//! | `NetworkThenCache`         | network            | network         | network         |
//! | `CacheFirstThenNetwork`    | deliver + network  | network         | network         |
//! | `CacheElseNetwork`         | deliver            | network         | network         |
//! | `CacheOnly`                | deliver            | fail StaleData  | fail CacheMiss  |

use crate::operation::OperationType;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// How a read uses the cache and the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Skip the cache entirely: no read, no write-back.
    NetworkOnly,
    /// Skip the cache read; write the network result back.
    NetworkThenCache,
    /// Deliver fresh cache data, then still fetch from the network.
    CacheFirstThenNetwork,
    /// Deliver fresh cache data, else fetch from the network.
    #[default]
    CacheElseNetwork,
    /// Deliver fresh cache data or fail. Never fetches.
    CacheOnly,
}

impl CachePolicy {
    /// Whether this policy attempts a cache read.
    #[must_use]
    pub const fn reads_cache(self) -> bool {
        matches!(
            self,
            Self::CacheFirstThenNetwork | Self::CacheElseNetwork | Self::CacheOnly
        )
    }

    /// Whether network results are written back to the store.
    #[must_use]
    pub const fn writes_cache(self) -> bool {
        !matches!(self, Self::NetworkOnly)
    }

    /// The policy actually applied to an operation.
    ///
    /// Mutations and subscriptions never read the cache; a cache-reading
    /// policy degrades to `NetworkThenCache` for them.
    #[must_use]
    pub const fn for_operation(self, operation_type: OperationType) -> Self {
        match operation_type {
            OperationType::Query => self,
            OperationType::Mutation | OperationType::Subscription => {
                if self.reads_cache() {
                    Self::NetworkThenCache
                } else {
                    self
                }
            }
        }
    }
}

/// Result of the cache-read step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The policy skipped the cache.
    NotRead,
    Hit,
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

impl Freshness {
    /// Fresh iff there is no TTL, or `max_age` is not earlier than
    /// `now - ttl` when both are truncated to the minute.
    #[must_use]
    pub fn evaluate(max_age: Timestamp, ttl_seconds: Option<i64>, now: Timestamp) -> Self {
        let Some(ttl) = ttl_seconds else {
            return Self::Fresh;
        };
        let threshold = now.saturating_sub_secs(ttl);
        if max_age.minute_bucket() >= threshold.minute_bucket() {
            Self::Fresh
        } else {
            Self::Stale
        }
    }
}

/// Terminal failures issued by the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFailure {
    /// Cache hit past its TTL under `CacheOnly`.
    StaleData,
    /// Cache miss under `CacheOnly`; the caller reports the underlying error.
    CacheMiss,
}

/// What the caller must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyDecision {
    pub deliver_cache: bool,
    pub proceed_to_network: bool,
    pub fail_with: Option<PolicyFailure>,
}

impl PolicyDecision {
    const NETWORK: Self = Self {
        deliver_cache: false,
        proceed_to_network: true,
        fail_with: None,
    };

    const fn fail(failure: PolicyFailure) -> Self {
        Self {
            deliver_cache: false,
            proceed_to_network: false,
            fail_with: Some(failure),
        }
    }
}

/// Decide the next step of a read.
#[must_use]
pub const fn decide(policy: CachePolicy, outcome: CacheOutcome, freshness: Freshness) -> PolicyDecision {
    let fresh_hit = matches!(outcome, CacheOutcome::Hit) && matches!(freshness, Freshness::Fresh);

    match policy {
        CachePolicy::NetworkOnly | CachePolicy::NetworkThenCache => PolicyDecision::NETWORK,
        CachePolicy::CacheFirstThenNetwork => PolicyDecision {
            deliver_cache: fresh_hit,
            proceed_to_network: true,
            fail_with: None,
        },
        CachePolicy::CacheElseNetwork => {
            if fresh_hit {
                PolicyDecision {
                    deliver_cache: true,
                    proceed_to_network: false,
                    fail_with: None,
                }
            } else {
                PolicyDecision::NETWORK
            }
        }
        CachePolicy::CacheOnly => match outcome {
            CacheOutcome::Hit => match freshness {
                Freshness::Fresh => PolicyDecision {
                    deliver_cache: true,
                    proceed_to_network: false,
                    fail_with: None,
                },
                Freshness::Stale => PolicyDecision::fail(PolicyFailure::StaleData),
            },
            CacheOutcome::Miss | CacheOutcome::NotRead => {
                PolicyDecision::fail(PolicyFailure::CacheMiss)
            }
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================
