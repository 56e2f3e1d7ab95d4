//! # Fetch Errors

use gqlcache_core::CacheError;
use thiserror::Error;

/// Errors delivered on a fetch's result stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The cache failed the read, or parsing/publishing the response failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The network stage failed.
    #[error("Network error: {0}")]
    Network(String),

    /// A blocking store task panicked or was cancelled by the runtime.
    #[error("Task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for FetchError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Join(error.to_string())
    }
}

impl FetchError {
    /// The cache error behind this failure, if any.
    #[must_use]
    pub const fn cache_error(&self) -> Option<&CacheError> {
        match self {
            Self::Cache(error) => Some(error),
            _ => None,
        }
    }
}
