//! # Network Stage
//!
//! The seam to the transport. The cache never builds requests itself; it
//! hands the operation to a `NetworkStage` and parses whatever body comes
//! back. Timeouts and retries belong to the implementation.

use crate::error::FetchError;
use gqlcache_core::Operation;
use serde_json::Value;
use std::future::Future;

/// Sends an operation to the server and returns the response body.
pub trait NetworkStage: Send + Sync + 'static {
    /// The raw response body (`{"data": ..., "errors": ...}`).
    fn fetch(&self, operation: &Operation) -> impl Future<Output = Result<Value, FetchError>> + Send;
}
