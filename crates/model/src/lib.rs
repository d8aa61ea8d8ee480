//! Model service clients
//!
//! Concrete HTTP implementations of the two model collaborator traits: a
//! Messages-API text backend with a primary/fallback model pair, and an
//! embeddings endpoint backend with dimension verification. The pipeline
//! itself only sees `localfind_core::{LanguageModel, EmbeddingModel}`;
//! these clients are wired in by the embedding application.

pub mod embedding;
pub mod text;

pub use embedding::{EmbeddingBackend, EmbeddingBackendConfig};
pub use text::{TextBackend, TextBackendConfig};

use thiserror::Error;

/// Model client errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Timeout
        } else {
            ModelError::Network(err.to_string())
        }
    }
}

impl From<ModelError> for localfind_core::Error {
    fn from(err: ModelError) -> Self {
        localfind_core::Error::ModelUnavailable(err.to_string())
    }
}
