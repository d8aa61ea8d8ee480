//! Embedding model backend
//!
//! HTTP client for the embeddings endpoint. The dimension is a deploy-time
//! constant; a response with any other length is a contract violation and
//! surfaces as `EmbeddingDimensionMismatch`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use localfind_config::EmbeddingSettings;
use localfind_core::{EmbeddingModel, Error};

use crate::ModelError;

/// Configuration for the embedding backend
#[derive(Debug, Clone)]
pub struct EmbeddingBackendConfig {
    pub api_key: String,
    pub model_id: String,
    /// Deploy-time dimension contract
    pub dimension: usize,
    pub timeout: Duration,
    pub endpoint: String,
}

impl Default for EmbeddingBackendConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("LOCALFIND_MODEL_API_KEY").unwrap_or_default(),
            model_id: "text-embed-v3".to_string(),
            dimension: 1024,
            timeout: Duration::from_secs(10),
            endpoint: "https://api.embeddings.example.com".to_string(),
        }
    }
}

impl EmbeddingBackendConfig {
    pub fn from_settings(settings: &EmbeddingSettings, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: settings.model_id.clone(),
            dimension: settings.dimension,
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Embeddings endpoint client
pub struct EmbeddingBackend {
    config: EmbeddingBackendConfig,
    client: Client,
}

impl EmbeddingBackend {
    pub fn new(config: EmbeddingBackendConfig) -> Result<Self, ModelError> {
        if config.api_key.is_empty() {
            return Err(ModelError::Configuration(
                "embedding API key not set".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn call(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let request = EmbedRequest {
            model: self.config.model_id.clone(),
            input: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(ModelError::Throttled(format!("HTTP 429: {error_text}")));
            }
            return Err(ModelError::Api(format!("HTTP {status}: {error_text}")));
        }

        let response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ModelError::InvalidResponse("empty embedding list".to_string()))
    }
}

#[async_trait]
impl EmbeddingModel for EmbeddingBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let vector = self.call(text).await.map_err(Error::from)?;
        if vector.len() != self.config.dimension {
            return Err(Error::EmbeddingDimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}
