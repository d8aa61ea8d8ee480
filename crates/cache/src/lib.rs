//! Read-through / write-through KV cache
//!
//! Two backends selected at startup: a remote REST KV when credentials are
//! configured, otherwise an in-process map with explicit expiry. Callers
//! never see backend failures: `get` degrades to a miss, `set` and `delete`
//! are best-effort. Keys are human-readable colon-delimited strings; values
//! are opaque.

pub mod keys;
pub mod memory;
pub mod remote;

pub use keys::{
    analysis_key, candidates_key, embedding_key, geocode_key, nlp_memo_key, results_key,
    similarity_key, vector_fingerprint,
};
pub use memory::InMemoryCache;
pub use remote::{RemoteKvCache, RemoteKvConfig};

use std::sync::Arc;
use std::time::Duration;

use localfind_config::CacheSettings;
use thiserror::Error;

/// Cache errors. Internal only; the facade converts every failure into a
/// miss or a logged warning.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<CacheError> for localfind_core::Error {
    fn from(err: CacheError) -> Self {
        localfind_core::Error::Cache(err.to_string())
    }
}

enum Backend {
    Memory(Arc<InMemoryCache>),
    Remote(RemoteKvCache),
}

/// The cache used by every pipeline stage.
pub struct QueryCache {
    backend: Backend,
}

impl QueryCache {
    /// Select a backend from settings: remote when endpoint and token are
    /// both present, in-process otherwise.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        if settings.remote_configured() {
            let config = RemoteKvConfig {
                endpoint: settings.kv_endpoint.clone().unwrap_or_default(),
                token: settings.kv_token.clone().unwrap_or_default(),
                timeout: Duration::from_secs(3),
            };
            match RemoteKvCache::new(config) {
                Ok(remote) => {
                    tracing::info!("Cache using remote KV backend");
                    return Self {
                        backend: Backend::Remote(remote),
                    };
                }
                Err(e) => {
                    tracing::warn!("Remote KV unavailable, falling back to memory: {e}");
                }
            }
        }
        Self::memory(Duration::from_secs(settings.sweep_interval_secs))
    }

    /// In-process backend with a background expiry sweeper.
    pub fn memory(sweep_interval: Duration) -> Self {
        let store = Arc::new(InMemoryCache::new());
        InMemoryCache::spawn_sweeper(&store, sweep_interval);
        Self {
            backend: Backend::Memory(store),
        }
    }

    /// In-process backend without the sweeper, for tests.
    pub fn memory_unswept() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(InMemoryCache::new())),
        }
    }

    /// Fetch a value. A backend failure is a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        let result = match &self.backend {
            Backend::Memory(store) => Ok(store.get(key)),
            Backend::Remote(remote) => remote.get(key).await,
        };
        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, "cache get failed: {e}");
                None
            }
        }
    }

    /// Fetch and deserialize. Undecodable entries are treated as misses and
    /// deleted so they cannot wedge the key.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, "cache entry undecodable, dropping: {e}");
                self.delete(key).await;
                None
            }
        }
    }

    /// Store a value. Best-effort; never surfaces an error to the caller.
    pub async fn set(&self, key: &str, value: String, ttl: Duration) {
        let result = match &self.backend {
            Backend::Memory(store) => {
                store.set(key, value, ttl);
                Ok(())
            }
            Backend::Remote(remote) => remote.set(key, &value, ttl).await,
        };
        if let Err(e) = result {
            tracing::warn!(key, "cache set failed: {e}");
        }
    }

    /// Serialize and store. Best-effort.
    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, raw, ttl).await,
            Err(e) => tracing::warn!(key, "cache value unserializable: {e}"),
        }
    }

    pub async fn delete(&self, key: &str) {
        let result = match &self.backend {
            Backend::Memory(store) => {
                store.delete(key);
                Ok(())
            }
            Backend::Remote(remote) => remote.delete(key).await,
        };
        if let Err(e) = result {
            tracing::warn!(key, "cache delete failed: {e}");
        }
    }

    /// Delete every key matching a `prefix*` pattern. Returns the number of
    /// keys removed (0 on backend failure).
    pub async fn scan_and_delete(&self, pattern: &str) -> usize {
        let result = match &self.backend {
            Backend::Memory(store) => Ok(store.scan_and_delete(pattern)),
            Backend::Remote(remote) => remote.scan_and_delete(pattern).await,
        };
        match result {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(pattern, "cache scan failed: {e}");
                0
            }
        }
    }
}
