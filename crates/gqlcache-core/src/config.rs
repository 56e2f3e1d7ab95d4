//! # Configuration
//!
//! TOML configuration for a cache store.
//!
//! ```toml
//! [store]
//! backend = "redb"
//! path = "cache.redb"
//! vacuum_on_clear = true
//! cache_key_field = "id"
//!
//! [policy]
//! default = "cache_first_then_network"
//! ttl_seconds = 300
//! ```
//!
//! Every key is optional; an empty document yields an in-memory store with
//! the `cache_else_network` policy and no TTL.

use crate::cache::StorageBackend;
use crate::execution::{CacheKeyFn, identity_key_fn};
use crate::operation::Operation;
use crate::policy::CachePolicy;
use crate::store::CacheStore;
use crate::types::CacheError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

// =============================================================================
// SECTIONS
// =============================================================================

/// Which backend the store runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Memory,
    Redb,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Database file. Required for the redb backend.
    pub path: Option<PathBuf>,
    /// Compact the database after every clear.
    pub vacuum_on_clear: bool,
    /// Field that identifies objects (e.g. `id`). Objects without it are
    /// keyed by their path.
    pub cache_key_field: Option<String>,
}

/// `[policy]` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub default: CachePolicy,
    /// TTL for operations that do not set their own.
    pub ttl_seconds: Option<i64>,
}

impl PolicyConfig {
    /// TTL in effect for `operation`: its own, else the configured default.
    #[must_use]
    pub fn ttl_for(&self, operation: &Operation) -> Option<i64> {
        operation.response_cache_ttl.or(self.ttl_seconds)
    }
}

/// Complete cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub store: StoreConfig,
    pub policy: PolicyConfig,
}

// =============================================================================
// LOADING
// =============================================================================

impl CacheConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, CacheError> {
        let config: Self =
            toml::from_str(source).map_err(|e| CacheError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| CacheError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.store.backend == BackendKind::Redb && self.store.path.is_none() {
            return Err(CacheError::Config(
                "store.path is required for the redb backend".to_string(),
            ));
        }
        if let Some(ttl) = self.policy.ttl_seconds {
            if ttl < 0 {
                return Err(CacheError::Config(format!(
                    "policy.ttl_seconds must not be negative, got {ttl}"
                )));
            }
        }
        if let Some(field) = &self.store.cache_key_field {
            if field.is_empty() {
                return Err(CacheError::Config(
                    "store.cache_key_field must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    // =========================================================================
    // BUILDING
    // =========================================================================

    /// Object identity function for `store.cache_key_field`, if set.
    #[must_use]
    pub fn cache_key_fn(&self) -> Option<CacheKeyFn> {
        self.store.cache_key_field.clone().map(identity_key_fn)
    }

    /// Open the configured backend. A redb backend is migrated on open.
    pub fn open_backend(&self) -> Result<StorageBackend, CacheError> {
        match (self.store.backend, &self.store.path) {
            (BackendKind::Memory, _) => Ok(StorageBackend::default()),
            (BackendKind::Redb, Some(path)) => {
                StorageBackend::open_redb(path, self.store.vacuum_on_clear)
            }
            (BackendKind::Redb, None) => Err(CacheError::Config(
                "store.path is required for the redb backend".to_string(),
            )),
        }
    }

    /// Open a store over the configured backend.
    pub fn open_store(&self) -> Result<CacheStore, CacheError> {
        let backend = self.open_backend()?;
        info!(
            backend = ?self.store.backend,
            policy = ?self.policy.default,
            "cache store opened"
        );
        Ok(CacheStore::new(backend).with_cache_key_fn(self.cache_key_fn()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
