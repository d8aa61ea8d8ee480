//! Remote KV backend
//!
//! A REST key-value service (Upstash-style command paths with bearer-token
//! auth). Selected when endpoint and token are configured; every operation
//! carries a short timeout so a slow backend degrades to a miss instead of
//! stalling the pipeline.

use std::time::Duration;

use serde::Deserialize;

use crate::CacheError;

/// Remote backend configuration.
#[derive(Debug, Clone)]
pub struct RemoteKvConfig {
    /// Base URL of the KV REST endpoint
    pub endpoint: String,
    /// Bearer token
    pub token: String,
    /// Per-operation timeout
    pub timeout: Duration,
}

/// Remote KV client.
pub struct RemoteKvCache {
    config: RemoteKvConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ValueReply {
    result: Option<String>,
}

#[derive(Deserialize)]
struct ScanReply {
    /// [next_cursor, [keys...]]
    result: (String, Vec<String>),
}

impl RemoteKvCache {
    pub fn new(config: RemoteKvConfig) -> Result<Self, CacheError> {
        if config.endpoint.is_empty() || config.token.is_empty() {
            return Err(CacheError::Unavailable(
                "remote KV endpoint or token missing".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let response = self
            .client
            .get(self.url(&format!("get/{key}")))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CacheError::Unavailable(format!(
                "get returned HTTP {}",
                response.status()
            )));
        }

        let reply: ValueReply = response
            .json()
            .await
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        Ok(reply.result)
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let response = self
            .client
            .post(self.url(&format!("set/{key}?EX={}", ttl.as_secs().max(1))))
            .bearer_auth(&self.config.token)
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CacheError::Unavailable(format!(
                "set returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let response = self
            .client
            .post(self.url(&format!("del/{key}")))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CacheError::Unavailable(format!(
                "del returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Cursor-driven SCAN + DEL. Returns the number of keys removed.
    pub async fn scan_and_delete(&self, pattern: &str) -> Result<usize, CacheError> {
        let mut cursor = "0".to_string();
        let mut removed = 0usize;

        loop {
            let response = self
                .client
                .get(self.url(&format!("scan/{cursor}?match={pattern}&count=1000")))
                .bearer_auth(&self.config.token)
                .send()
                .await
                .map_err(|e| CacheError::Unavailable(e.to_string()))?;

            if !response.status().is_success() {
                return Err(CacheError::Unavailable(format!(
                    "scan returned HTTP {}",
                    response.status()
                )));
            }

            let reply: ScanReply = response
                .json()
                .await
                .map_err(|e| CacheError::Serialization(e.to_string()))?;

            for key in &reply.result.1 {
                self.delete(key).await?;
                removed += 1;
            }

            cursor = reply.result.0;
            if cursor == "0" {
                break;
            }
        }

        Ok(removed)
    }
}
