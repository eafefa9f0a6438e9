//! Tap configuration
//!
//! Loaded once from the `--config` JSON file, then overlaid with environment
//! variables. Immutable after startup.

use crate::error::{Result, TapError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Configuration Defaults
// ============================================================================

/// Versioned API root.
pub const DEFAULT_BASE_URL: &str = "https://duedil.io/v4/";

/// Per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Attempts per request for rate-limited or unavailable responses.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// First backoff delay; doubles after every failed attempt.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 2_000;

/// Pause before re-issuing a company search that returned nothing.
pub const DEFAULT_QUERY_COOLDOWN_SECS: u64 = 30;

/// Company search attempts per offset before the run is aborted.
pub const DEFAULT_QUERY_MAX_ATTEMPTS: u32 = 3;

/// Companies per checkpointed work unit.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// `limit` sent with every paginated request.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Upper bound on pages fetched by one pagination loop.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

const REQUIRED_KEYS: &[&str] = &["api_key"];

fn missing_keys(raw: &serde_json::Value) -> Vec<&'static str> {
    REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| raw.get(key).is_none())
        .collect()
}

fn missing_keys_error(missing: &[&str]) -> TapError {
    TapError::config(format!("Config is missing required keys: {:?}", missing))
}

/// Tap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DueDil API key, sent as `X-AUTH-TOKEN`
    pub api_key: String,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_query_cooldown_secs")]
    pub query_cooldown_secs: u64,

    #[serde(default = "default_query_max_attempts")]
    pub query_max_attempts: u32,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_page_size")]
    pub page_size: u64,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}

fn default_query_cooldown_secs() -> u64 {
    DEFAULT_QUERY_COOLDOWN_SECS
}

fn default_query_max_attempts() -> u32 {
    DEFAULT_QUERY_MAX_ATTEMPTS
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

impl Config {
    /// Config with defaults for everything but the key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            user_agent: None,
            base_url: default_base_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            query_cooldown_secs: DEFAULT_QUERY_COOLDOWN_SECS,
            query_max_attempts: DEFAULT_QUERY_MAX_ATTEMPTS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Load from a JSON file, then apply environment overrides
    ///
    /// `DUEDIL_API_KEY` may stand in for an `api_key` the file omits.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TapError::config(format!("cannot read '{}': {}", path.display(), e))
        })?;

        let raw: serde_json::Value = serde_json::from_str(&content)?;
        let missing = missing_keys(&raw);
        let config = Self::from_document(raw)?.with_env_overrides();
        if !missing.is_empty() && config.api_key.is_empty() {
            return Err(missing_keys_error(&missing));
        }
        config.validated()
    }

    /// Parse a config document, reporting every missing required key at once
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(content)?;
        let missing = missing_keys(&raw);
        if !missing.is_empty() {
            return Err(missing_keys_error(&missing));
        }
        Self::from_document(raw)
    }

    fn from_document(mut raw: serde_json::Value) -> Result<Self> {
        if let Some(obj) = raw.as_object_mut() {
            obj.entry("api_key").or_insert_with(|| "".into());
        }
        Ok(serde_json::from_value(raw)?)
    }

    /// Apply `DUEDIL_*` environment variables
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("DUEDIL_API_KEY") {
            self.api_key = key;
        }

        if let Ok(url) = std::env::var("DUEDIL_BASE_URL") {
            self.base_url = url;
        }

        if let Ok(agent) = std::env::var("DUEDIL_USER_AGENT") {
            self.user_agent = Some(agent);
        }

        self
    }

    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(TapError::config("api_key cannot be empty"));
        }

        if self.base_url.is_empty() {
            return Err(TapError::config("base_url cannot be empty"));
        }

        if self.chunk_size == 0 {
            return Err(TapError::config("chunk_size must be greater than 0"));
        }

        if self.page_size == 0 {
            return Err(TapError::config("page_size must be greater than 0"));
        }

        if self.max_pages == 0 {
            return Err(TapError::config("max_pages must be greater than 0"));
        }

        if self.max_retries == 0 || self.query_max_attempts == 0 {
            return Err(TapError::config("retry attempt limits must be at least 1"));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn query_cooldown(&self) -> Duration {
        Duration::from_secs(self.query_cooldown_secs)
    }
}
