//! Cached query embedder
//!
//! Read-through over the embedding model: the cache is probed first (keyed
//! by model version and text hash, 30-day TTL), and a miss goes through
//! rate-limit admission and the retry harness. A zero vector of the
//! configured dimension is the advertised degraded value; the semantic
//! retriever short-circuits on it.

use std::sync::Arc;
use std::time::Duration;

use localfind_cache::{embedding_key, QueryCache};
use localfind_config::constants::ttl;
use localfind_core::{EmbeddingModel, Error, Result};
use localfind_resilience::{retry_with_backoff, RateLimiter};

/// Embedder configuration
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    /// Version tag shared with the stored business vectors
    pub version: String,
    /// Deploy-time dimension constant
    pub dimension: usize,
    pub wait_slot: Duration,
    pub call_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            version: "v2".to_string(),
            dimension: 1024,
            wait_slot: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

/// The query-embedding provider.
pub struct QueryEmbedder {
    model: Arc<dyn EmbeddingModel>,
    cache: Arc<QueryCache>,
    limiter: Arc<RateLimiter>,
    config: EmbedderConfig,
}

impl QueryEmbedder {
    pub fn new(
        model: Arc<dyn EmbeddingModel>,
        cache: Arc<QueryCache>,
        limiter: Arc<RateLimiter>,
        config: EmbedderConfig,
    ) -> Self {
        Self {
            model,
            cache,
            limiter,
            config,
        }
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    /// The degraded value handed out when embedding cannot be obtained.
    pub fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.config.dimension]
    }

    /// Embed a query string, cached. Returns `(vector, from_cache)`.
    pub async fn embed_query(
        &self,
        text: &str,
        user_id: Option<&str>,
        ip: Option<&str>,
    ) -> Result<(Vec<f32>, bool)> {
        let key = embedding_key(&self.config.version, text);

        if let Some(cached) = self.cache.get_json::<Vec<f32>>(&key).await {
            if cached.len() == self.config.dimension {
                return Ok((cached, true));
            }
            // A stale deployment wrote a different dimension; drop it
            tracing::warn!(
                key,
                cached_len = cached.len(),
                "cached embedding has wrong dimension, discarding"
            );
            self.cache.delete(&key).await;
        }

        self.limiter
            .wait_for_slot(user_id, ip, self.config.wait_slot)
            .await?;

        let model = Arc::clone(&self.model);
        let config = &self.config;
        let text_owned = text.to_string();
        let vector = retry_with_backoff(
            || {
                let model = Arc::clone(&model);
                let text = text_owned.clone();
                async move {
                    match tokio::time::timeout(config.call_timeout, model.embed(&text)).await {
                        Ok(result) => result,
                        Err(_) => Err(Error::ModelUnavailable(format!(
                            "embedding call timed out after {}ms",
                            config.call_timeout.as_millis()
                        ))),
                    }
                }
            },
            config.max_retries,
            config.initial_backoff,
        )
        .await?;

        if vector.len() != self.config.dimension {
            return Err(Error::EmbeddingDimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }

        self.cache
            .set_json(&key, &vector, Duration::from_secs(ttl::EMBEDDING_SECS))
            .await;
        Ok((vector, false))
    }
}

/// Whether a vector is the all-zero degraded value.
pub fn is_zero_vector(vector: &[f32]) -> bool {
    vector.iter().all(|v| *v == 0.0)
}
