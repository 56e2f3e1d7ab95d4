//! # gqlcache
//!
//! The async request pipeline over the gqlcache-core store - THE PIPELINE.
//!
//! A fetch runs in stages:
//!
//! 1. The cache stage ([`CacheReadInterceptor`]) reads the operation from
//!    the store on the blocking pool and grades it against the TTL.
//! 2. The policy engine decides whether to deliver the cached result, go
//!    to the network, or fail.
//! 3. The network stage ([`NetworkStage`]) fetches a response body, which
//!    is parsed and written back to the store.
//!
//! ## Architectural Notes
//!
//! - This is the only async component; every store operation is handed to
//!   `tokio::task::spawn_blocking`
//! - Results of one fetch are delivered in stage order and never after the
//!   fetch is cancelled

// =============================================================================
// MODULES
// =============================================================================

pub mod client;
pub mod error;
pub mod interceptor;
pub mod network;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use client::{CacheClient, FetchHandle};
pub use error::FetchError;
pub use interceptor::{CacheRead, CacheReadInterceptor};
pub use network::NetworkStage;
