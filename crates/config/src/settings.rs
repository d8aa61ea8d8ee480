//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{limits, model, pipeline, retrieval};
use crate::ConfigError;

/// Runtime environment enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Text model configuration
    #[serde(default)]
    pub model: ModelSettings,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Cache backend configuration
    #[serde(default)]
    pub cache: CacheSettings,

    /// Rate limiter configuration
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Retrieval and fusion configuration
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    /// Pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Text model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model service region
    #[serde(default = "default_model_region")]
    pub region: String,

    /// Primary model id
    #[serde(default = "default_primary_model")]
    pub primary_model_id: String,

    /// Fallback model id, tried when the primary is throttled or erroring
    #[serde(default = "default_fallback_model")]
    pub fallback_model_id: String,

    /// Optional inference profile reference passed through to the service
    #[serde(default)]
    pub inference_profile: Option<String>,

    /// Per-call hard timeout in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model_region() -> String {
    "ap-south-1".to_string()
}

fn default_primary_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_fallback_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_call_timeout_ms() -> u64 {
    model::CALL_TIMEOUT_MS
}

fn default_max_retries() -> u32 {
    model::MAX_RETRIES
}

fn default_initial_backoff_ms() -> u64 {
    model::INITIAL_BACKOFF_MS
}

fn default_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            region: default_model_region(),
            primary_model_id: default_primary_model(),
            fallback_model_id: default_fallback_model(),
            inference_profile: None,
            call_timeout_ms: default_call_timeout_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Embedding model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embedding_model")]
    pub model_id: String,

    /// Deploy-time dimension constant; business vectors and query vectors
    /// share it
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Version tag under which business vectors were indexed
    #[serde(default = "default_embedding_version")]
    pub version: String,
}

fn default_embedding_model() -> String {
    "text-embed-v3".to_string()
}

fn default_embedding_dimension() -> usize {
    1024
}

fn default_embedding_version() -> String {
    "v2".to_string()
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_id: default_embedding_model(),
            dimension: default_embedding_dimension(),
            version: default_embedding_version(),
        }
    }
}

/// Cache backend settings. Remote mode is selected only when both endpoint
/// and token are present; otherwise the in-process map is used.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheSettings {
    /// Remote KV REST endpoint
    #[serde(default)]
    pub kv_endpoint: Option<String>,

    /// Remote KV bearer token
    #[serde(default)]
    pub kv_token: Option<String>,

    /// In-memory sweeper period in seconds
    #[serde(default = "default_sweep_secs")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_secs() -> u64 {
    60
}

impl CacheSettings {
    pub fn remote_configured(&self) -> bool {
        self.kv_endpoint.as_deref().is_some_and(|e| !e.is_empty())
            && self.kv_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Rate limiter settings (sliding one-hour windows)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_user_limit")]
    pub per_user_per_hour: u32,

    #[serde(default = "default_ip_limit")]
    pub per_ip_per_hour: u32,

    #[serde(default = "default_global_limit")]
    pub global_per_hour: u32,

    /// Admission wait budget per model call, milliseconds
    #[serde(default = "default_wait_slot_ms")]
    pub wait_slot_ms: u64,
}

fn default_user_limit() -> u32 {
    limits::PER_USER
}

fn default_ip_limit() -> u32 {
    limits::PER_IP
}

fn default_global_limit() -> u32 {
    limits::GLOBAL
}

fn default_wait_slot_ms() -> u64 {
    limits::WAIT_SLOT_MS
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            per_user_per_hour: default_user_limit(),
            per_ip_per_hour: default_ip_limit(),
            global_per_hour: default_global_limit(),
            wait_slot_ms: default_wait_slot_ms(),
        }
    }
}

/// Retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Weight of the semantic score in hybrid fusion (0.0 - 1.0)
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,

    /// Weight of the keyword score in hybrid fusion (0.0 - 1.0)
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,

    /// Hard cap on semantic candidates
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,

    /// Embedding components hashed into the similarity cache key
    #[serde(default = "default_fingerprint_components")]
    pub fingerprint_components: usize,

    /// Apply the category filter only when at least one candidate survives it
    #[serde(default = "default_true")]
    pub keep_on_empty_category: bool,
}

fn default_semantic_weight() -> f64 {
    retrieval::SEMANTIC_WEIGHT
}

fn default_keyword_weight() -> f64 {
    retrieval::KEYWORD_WEIGHT
}

fn default_candidate_cap() -> usize {
    retrieval::CANDIDATE_CAP
}

fn default_fingerprint_components() -> usize {
    retrieval::FINGERPRINT_COMPONENTS
}

fn default_true() -> bool {
    true
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            candidate_cap: default_candidate_cap(),
            fingerprint_components: default_fingerprint_components(),
            keep_on_empty_category: true,
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Whole-request deadline in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Result page size
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_request_timeout_ms() -> u64 {
    pipeline::REQUEST_TIMEOUT_MS
}

fn default_page_size() -> usize {
    retrieval::PAGE_SIZE
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            page_size: default_page_size(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_retrieval()?;
        self.validate_embedding()?;
        self.validate_limits()?;
        self.validate_pipeline()?;
        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;

        if !(0.0..=1.0).contains(&r.semantic_weight) {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.semantic_weight".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", r.semantic_weight),
            });
        }
        if !(0.0..=1.0).contains(&r.keyword_weight) {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.keyword_weight".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", r.keyword_weight),
            });
        }
        if (r.semantic_weight + r.keyword_weight - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.keyword_weight".to_string(),
                message: "Fusion weights must sum to 1.0".to_string(),
            });
        }
        if r.candidate_cap == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.candidate_cap".to_string(),
                message: "Candidate cap must be positive".to_string(),
            });
        }
        if r.fingerprint_components == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.fingerprint_components".to_string(),
                message: "Fingerprint must hash at least one component".to_string(),
            });
        }
        Ok(())
    }

    fn validate_embedding(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                field: "embedding.dimension".to_string(),
                message: "Dimension must be positive".to_string(),
            });
        }
        if self.embedding.version.is_empty() {
            return Err(ConfigError::MissingField("embedding.version".to_string()));
        }
        Ok(())
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        let l = &self.rate_limit;
        for (field, value) in [
            ("rate_limit.per_user_per_hour", l.per_user_per_hour),
            ("rate_limit.per_ip_per_hour", l.per_ip_per_hour),
            ("rate_limit.global_per_hour", l.global_per_hour),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Limit must be positive".to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_pipeline(&self) -> Result<(), ConfigError> {
        if self.pipeline.request_timeout_ms < 1000 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.request_timeout_ms".to_string(),
                message: "Request timeout too low (minimum 1000ms)".to_string(),
            });
        }
        if self.pipeline.page_size == 0 || self.pipeline.page_size > 100 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.page_size".to_string(),
                message: "Page size must be between 1 and 100".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings from an optional file plus LOCALFIND_-prefixed environment
/// variables. Environment wins over file; file wins over defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(File::from(path));
    }

    let config = builder
        .add_source(Environment::with_prefix("LOCALFIND").separator("__"))
        .build()?;

    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;

    tracing::debug!(
        environment = ?settings.environment,
        remote_cache = settings.cache.remote_configured(),
        "Settings loaded"
    );

    Ok(settings)
}
