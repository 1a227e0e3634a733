use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::ai::AiEndpointConfig;

/// Backend settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub webhook_secret: String,
    pub webhook_tolerance_secs: u64,
    pub ack_unknown_events: bool,
    pub store_file: Option<PathBuf>,
    pub max_request_bytes: Option<usize>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();
        if webhook_secret.trim().is_empty() {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not set; all webhooks will be rejected");
        }
        let webhook_tolerance_secs =
            parse_optional_u64("QUICKSUM_WEBHOOK_TOLERANCE_SECS")?.unwrap_or(300);
        let ack_unknown_events = parse_bool_env("QUICKSUM_ACK_UNKNOWN_EVENTS")?.unwrap_or(true);
        let store_file = env::var("QUICKSUM_STORE_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let max_request_bytes =
            parse_optional_u64("QUICKSUM_MAX_REQUEST_BYTES")?.map(|v| v as usize);

        Ok(Self {
            webhook_secret: webhook_secret.trim().to_string(),
            webhook_tolerance_secs,
            ack_unknown_events,
            store_file,
            max_request_bytes,
        })
    }
}

/// Settings for the extension-side client core.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ai: AiEndpointConfig,
    pub backend_url: String,
    pub lookup_timeout: Duration,
    pub cache_ttl: Duration,
    pub checkout_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ai: AiEndpointConfig::new("http://127.0.0.1:8081/summarize"),
            backend_url: "http://127.0.0.1:8080".to_string(),
            lookup_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(3600),
            checkout_url: "https://checkout.stripe.com/pay".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(url) = non_empty_var("QUICKSUM_AI_ENDPOINT") {
            ensure_http_url(&url).context("QUICKSUM_AI_ENDPOINT must be an http(s) URL")?;
            cfg.ai.url = url;
        }
        cfg.ai.api_key = non_empty_var("QUICKSUM_AI_API_KEY");
        if let Some(ms) = parse_optional_u64("QUICKSUM_AI_TIMEOUT_MS")? {
            cfg.ai.timeout_ms = ms;
        }
        if let Some(ms) = parse_optional_u64("QUICKSUM_AI_BACKOFF_MS")? {
            cfg.ai.backoff_ms = ms;
        }
        if let Some(n) = parse_optional_u64("QUICKSUM_AI_MAX_RETRIES")? {
            cfg.ai.max_retries =
                u32::try_from(n).map_err(|_| anyhow!("QUICKSUM_AI_MAX_RETRIES is too large"))?;
        }
        if let Some(url) = non_empty_var("QUICKSUM_BACKEND_URL") {
            ensure_http_url(&url).context("QUICKSUM_BACKEND_URL must be an http(s) URL")?;
            cfg.backend_url = url;
        }
        if let Some(secs) = parse_optional_u64("QUICKSUM_CACHE_TTL_SECS")? {
            cfg.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(url) = non_empty_var("QUICKSUM_CHECKOUT_URL") {
            cfg.checkout_url = url;
        }
        Ok(cfg)
    }
}

fn ensure_http_url(raw: &str) -> Result<()> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("unsupported URL '{}'", raw))
    }
}

fn non_empty_var(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_optional_u64(var: &str) -> Result<Option<u64>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a positive integer", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_bool_env(var: &str) -> Result<Option<bool>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value)
            .map(Some)
            .ok_or_else(|| anyhow!("{} must be a boolean (true/false/1/0)", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
