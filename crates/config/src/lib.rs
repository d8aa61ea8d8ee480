//! Configuration management for the search core
//!
//! Supports loading configuration from:
//! - YAML/TOML files
//! - Environment variables (LOCALFIND_ prefix)
//! - Built-in defaults (no file and no credentials selects the in-process
//!   cache and disables rate-limit headers)

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, CacheSettings, EmbeddingSettings, ModelSettings, PipelineSettings,
    RateLimitSettings, RetrievalSettings, RuntimeEnvironment, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
