//! Client settings for the remote supervision backend.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sentinel_contracts::error::{SentinelError, SentinelResult};

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_review_timeout_secs() -> u64 {
    300
}

fn default_max_poll_failures() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_history() -> usize {
    10
}

/// Backend connection and polling configuration.
///
/// ```toml
/// base_url = "https://sentinel.internal"
/// api_key = "..."
/// poll_interval_secs = 5
/// review_timeout_secs = 300
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as a bearer token when present.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Delay between status checks while a review is outstanding.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// How long a human review may stay unresolved before escalating.
    #[serde(default = "default_review_timeout_secs")]
    pub review_timeout_secs: u64,

    /// Consecutive failed status checks tolerated before giving up.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,

    /// Per-HTTP-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Conversation turns forwarded with each supervision request.
    #[serde(default = "default_history")]
    pub history: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: std::env::var("SENTINEL_BASE_URL").unwrap_or_else(|_| default_base_url()),
            api_key: std::env::var("SENTINEL_API_KEY").ok(),
            poll_interval_secs: default_poll_interval_secs(),
            review_timeout_secs: default_review_timeout_secs(),
            max_poll_failures: default_max_poll_failures(),
            request_timeout_secs: default_request_timeout_secs(),
            history: default_history(),
        }
    }
}

impl ClientConfig {
    /// Read `SENTINEL_BASE_URL` and `SENTINEL_API_KEY`, defaulting the rest.
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(base_url: &str) -> Self {
        ClientConfig {
            base_url: base_url.to_string(),
            api_key: None,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn from_toml_str(s: &str) -> SentinelResult<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| SentinelError::config(format!("failed to parse client TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> SentinelResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SentinelError::config(format!(
                "failed to read client config '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> SentinelResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(SentinelError::config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(SentinelError::config("poll_interval_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn review_timeout(&self) -> Duration {
        Duration::from_secs(self.review_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
