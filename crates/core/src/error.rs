//! Error types shared across the search pipeline
//!
//! Only `InvalidQuery` short-circuits a request. Every other variant is
//! recorded into the pipeline telemetry and the request continues on the
//! stage's declared fallback path.

use thiserror::Error;

/// Convenience result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Behavioral error categories, independent of which subsystem raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request-level validation failure; surfaced to the caller, pipeline never starts
    InvalidQuery,
    /// A rate-limit waiter exceeded its timeout
    RateLimitTimeout,
    /// The external model could not produce output (timeout, throttle, api error)
    ModelUnavailable,
    /// A vector did not match the configured dimension
    EmbeddingDimensionMismatch,
    /// A store query failed after retries
    StoreUnavailable,
    /// The whole-request budget expired
    Timeout,
    /// Anything unexpected
    Internal,
}

impl ErrorKind {
    /// Kinds that justify a 5xx when the result set is empty.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            ErrorKind::ModelUnavailable | ErrorKind::StoreUnavailable | ErrorKind::Timeout
        )
    }
}

/// Workspace-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("rate limit wait timed out after {waited_ms}ms for scope {scope}")]
    RateLimitTimeout { scope: String, waited_ms: u64 },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("normalization error: {0}")]
    Normalize(String),

    #[error("analysis error: {0}")]
    Nlp(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error onto the behavioral taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidQuery(_) => ErrorKind::InvalidQuery,
            Error::RateLimitTimeout { .. } => ErrorKind::RateLimitTimeout,
            Error::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Error::EmbeddingDimensionMismatch { .. } => ErrorKind::EmbeddingDimensionMismatch,
            Error::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Cache(_) | Error::Normalize(_) | Error::Nlp(_) | Error::Retrieval(_) => {
                ErrorKind::Internal
            }
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error alone justifies a partial-failure response.
    pub fn is_critical(&self) -> bool {
        self.kind().is_critical()
    }
}
