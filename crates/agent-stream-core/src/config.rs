//! Stream client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::BackoffPolicy;

/// Default number of reconnect attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
/// Default WebSocket keep-alive ping interval (milliseconds).
pub const DEFAULT_WS_PING_INTERVAL_MS: u64 = 30_000;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported base URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration shared by every stream opened through a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// API origin that `runs/{workflow_id}/{run_id}/...` is appended to.
    pub base_url: Url,

    /// Consecutive failed connection attempts tolerated before the stream fails.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Reconnect delay policy.
    #[serde(default)]
    pub backoff: BackoffPolicy,

    /// Keep-alive ping interval for WebSocket streams (milliseconds, 0 disables).
    #[serde(default = "default_ws_ping_interval_ms")]
    pub ws_ping_interval_ms: u64,
}

const fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}

const fn default_ws_ping_interval_ms() -> u64 {
    DEFAULT_WS_PING_INTERVAL_MS
}

impl StreamConfig {
    /// Create a configuration with defaults for the given API origin.
    ///
    /// # Errors
    /// Returns error if the URL does not parse or is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url)?;
        Self::from_url(base_url)
    }

    /// Create a configuration with defaults for an already parsed origin.
    ///
    /// # Errors
    /// Returns error if the URL is not http(s).
    pub fn from_url(base_url: Url) -> Result<Self, ConfigError> {
        let config = Self {
            base_url,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            backoff: BackoffPolicy::default(),
            ws_ping_interval_ms: DEFAULT_WS_PING_INTERVAL_MS,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration document.
    ///
    /// # Errors
    /// Returns error if the document is malformed or the URL is not http(s).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the reconnect budget.
    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the backoff policy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the WebSocket keep-alive interval (0 disables).
    #[must_use]
    pub const fn with_ws_ping_interval_ms(mut self, interval_ms: u64) -> Self {
        self.ws_ping_interval_ms = interval_ms;
        self
    }

    /// Keep-alive interval for WebSocket streams, if enabled.
    #[must_use]
    pub const fn ws_ping_interval(&self) -> Option<Duration> {
        if self.ws_ping_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.ws_ping_interval_ms))
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.base_url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::new("https://api.example.com/api/v1").unwrap();
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.backoff, BackoffPolicy::default());
        assert_eq!(config.ws_ping_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(matches!(
            StreamConfig::new("ftp://example.com"),
            Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            StreamConfig::new("not a url"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_from_json_with_defaults() {
        let config = StreamConfig::from_json(
            r#"{"base_url": "http://localhost:8080", "backoff": {"base_delay_ms": 10}, "ws_ping_interval_ms": 0}"#,
        )
        .unwrap();
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.backoff.base_delay_ms, 10);
        assert_eq!(config.backoff.max_delay_ms, 30_000);
        assert_eq!(config.ws_ping_interval(), None);
    }

    #[test]
    fn test_builders() {
        let config = StreamConfig::new("http://localhost")
            .unwrap()
            .with_max_reconnect_attempts(3)
            .with_backoff(BackoffPolicy::new(5, 50));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.backoff.max_delay_ms, 50);
    }
}
