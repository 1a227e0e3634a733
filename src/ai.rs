use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AiError;

/// Reply used when the endpoint answers 2xx without a usable text field.
pub const PLACEHOLDER_REPLY: &str = "Response not available.";

/// Connection settings for the generation endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiEndpointConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_timeout_ms() -> u64 {
    15_000
}
fn default_backoff_ms() -> u64 {
    1_000
}
fn default_max_retries() -> u32 {
    1
}
fn default_max_tokens() -> u32 {
    500
}

impl AiEndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            backoff_ms: default_backoff_ms(),
            max_retries: default_max_retries(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
    max_tokens: u32,
}

/// Client for the generation endpoint: one POST per attempt, a fixed
/// per-attempt timeout and a bounded number of retries for transient
/// failures.
#[derive(Clone)]
pub struct AiClient {
    cfg: AiEndpointConfig,
    client: reqwest::Client,
}

impl AiClient {
    pub fn new(cfg: AiEndpointConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| AiError::Transport(e.to_string()))?;
        Ok(Self { cfg, client })
    }

    pub fn config(&self) -> &AiEndpointConfig {
        &self.cfg
    }

    /// Send `prompt` and return the generated text.  Retries timeouts,
    /// transport errors and 5xx statuses up to `max_retries` times with a
    /// fixed backoff; everything else is returned on first occurrence.
    pub async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let backoff = Duration::from_millis(self.cfg.backoff_ms);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.attempt(prompt).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt <= self.cfg.max_retries => {
                    tracing::warn!(attempt, error = %err, "generation attempt failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "generation failed");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, prompt: &str) -> Result<String, AiError> {
        let mut rb = self.client.post(&self.cfg.url).json(&GenerateBody {
            prompt,
            max_tokens: self.cfg.max_tokens,
        });
        if let Some(key) = &self.cfg.api_key {
            rb = rb.bearer_auth(key);
        }
        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AiError::Remote {
                status: status.as_u16(),
            });
        }
        let text = resp.text().await?;
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| AiError::Decode(e.to_string()))?;
        Ok(extract_reply(&json))
    }
}

/// Pull the reply text out of a response body, preferring `response` over
/// `summary`.
fn extract_reply(val: &serde_json::Value) -> String {
    ["response", "summary"]
        .iter()
        .filter_map(|field| val.get(*field).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
        .unwrap_or(PLACEHOLDER_REPLY)
        .to_string()
}
