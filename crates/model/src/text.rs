//! Text model backend
//!
//! Implements the Messages API over HTTP. Requests go to the configured
//! primary model; throttles and server errors fail over to the fallback
//! model id once before surfacing the error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use localfind_config::ModelSettings;
use localfind_core::{Error, LanguageModel};

use crate::ModelError;

/// Configuration for the text backend
#[derive(Debug, Clone)]
pub struct TextBackendConfig {
    /// API key
    pub api_key: String,
    /// Primary model id
    pub primary_model_id: String,
    /// Fallback model id tried when the primary throttles or errors
    pub fallback_model_id: String,
    /// Optional inference profile reference, passed through verbatim
    pub inference_profile: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// API endpoint (for testing or proxy)
    pub endpoint: String,
}

impl Default for TextBackendConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("LOCALFIND_MODEL_API_KEY").unwrap_or_default(),
            primary_model_id: "claude-3-5-haiku-20241022".to_string(),
            fallback_model_id: "claude-3-haiku-20240307".to_string(),
            inference_profile: None,
            timeout: Duration::from_secs(10),
            endpoint: "https://api.anthropic.com".to_string(),
        }
    }
}

impl TextBackendConfig {
    pub fn from_settings(settings: &ModelSettings, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            primary_model_id: settings.primary_model_id.clone(),
            fallback_model_id: settings.fallback_model_id.clone(),
            inference_profile: settings.inference_profile.clone(),
            timeout: Duration::from_millis(settings.call_timeout_ms),
            endpoint: "https://api.anthropic.com".to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Messages-API text backend
pub struct TextBackend {
    config: TextBackendConfig,
    client: Client,
}

impl TextBackend {
    pub fn new(config: TextBackendConfig) -> Result<Self, ModelError> {
        if config.api_key.is_empty() {
            return Err(ModelError::Configuration(
                "model API key not set".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn call_model(
        &self,
        model_id: &str,
        prompt: &str,
        system: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ModelError> {
        let request = MessagesRequest {
            model: model_id.to_string(),
            max_tokens,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system: system.map(|s| s.to_string()),
            temperature: Some(temperature),
            inference_profile: self.config.inference_profile.clone(),
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.endpoint))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
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

        let response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let text: String = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
            })
            .collect();

        if text.is_empty() {
            return Err(ModelError::InvalidResponse(
                "response carried no text blocks".to_string(),
            ));
        }
        Ok(text)
    }

    fn should_fail_over(error: &ModelError) -> bool {
        matches!(
            error,
            ModelError::Throttled(_) | ModelError::Timeout | ModelError::Api(_)
        )
    }
}

#[async_trait]
impl LanguageModel for TextBackend {
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, Error> {
        match self
            .call_model(
                &self.config.primary_model_id,
                prompt,
                system,
                max_tokens,
                temperature,
            )
            .await
        {
            Ok(text) => Ok(text),
            Err(error) if Self::should_fail_over(&error) => {
                tracing::warn!(
                    primary = %self.config.primary_model_id,
                    fallback = %self.config.fallback_model_id,
                    "primary model failed, trying fallback: {error}"
                );
                self.call_model(
                    &self.config.fallback_model_id,
                    prompt,
                    system,
                    max_tokens,
                    temperature,
                )
                .await
                .map_err(Error::from)
            }
            Err(error) => Err(error.into()),
        }
    }
}

// =============================================================================
// API types
// =============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inference_profile: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_rejected() {
        let config = TextBackendConfig {
            api_key: String::new(),
            ..Default::default()
        };
        assert!(TextBackend::new(config).is_err());
    }

    #[test]
    fn test_request_serialization() {
        let request = MessagesRequest {
            model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 512,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: "classify this".to_string(),
            }],
            system: Some("You classify queries".to_string()),
            temperature: Some(0.0),
            inference_profile: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("claude-3-5-haiku-20241022"));
        assert!(json.contains("classify this"));
        assert!(!json.contains("inference_profile"));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "content": [{"type": "text", "text": "{\"intent\": \"search\"}"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.content.len(), 1);
    }

    #[test]
    fn test_fail_over_policy() {
        assert!(TextBackend::should_fail_over(&ModelError::Timeout));
        assert!(TextBackend::should_fail_over(&ModelError::Throttled(
            "429".to_string()
        )));
        assert!(TextBackend::should_fail_over(&ModelError::Api(
            "HTTP 500".to_string()
        )));
        assert!(!TextBackend::should_fail_over(&ModelError::Configuration(
            "no key".to_string()
        )));
    }
}
