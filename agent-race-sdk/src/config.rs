//! SDK configuration
//!
//! This module provides configuration options for the SDK client, including
//! resolution of the API origin from the environment.

use crate::error::{SdkError, SdkResult};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Origin used when nothing (or nothing usable) is configured
pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";

/// Environment variable selecting the API origin
pub const API_URL_ENV: &str = "AGENT_RACE_API_URL";

/// Cadence of the refresh poll while a race is being judged
pub const DEFAULT_JUDGING_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Turn a user-supplied origin into a base URL.
///
/// Accepted forms:
/// - full `http(s)://host[:port]` URL, used as-is minus trailing slashes
/// - bare `:port`, served from `localhost`
/// - bare `host[:port]`, prefixed with `http://`
///
/// Absent, blank or malformed values fall back to [`DEFAULT_ORIGIN`].
pub fn normalize_origin(raw: Option<&str>) -> String {
    let value = match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return DEFAULT_ORIGIN.to_string(),
    };

    let lower = value.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        value.to_string()
    } else if let Some(port) = value.strip_prefix(':') {
        format!("http://localhost:{}", port)
    } else {
        format!("http://{}", value)
    };
    let candidate = candidate.trim_end_matches('/');

    match Url::parse(candidate) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => candidate.to_string(),
        _ => {
            warn!(origin = %value, fallback = DEFAULT_ORIGIN, "Ignoring malformed API origin");
            DEFAULT_ORIGIN.to_string()
        }
    }
}

/// Configuration for the SDK client
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Base URL for the API
    pub base_url: String,

    /// Request timeout (not applied to the event stream)
    pub timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Maximum number of retries for idempotent requests
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_initial_backoff: Duration,

    /// Maximum backoff duration for retries
    pub retry_max_backoff: Duration,

    /// Interval between refreshes while a race is judging
    pub judging_poll_interval: Duration,

    /// User agent string
    pub user_agent: String,

    /// Enable request/response logging
    pub enable_logging: bool,

    /// Custom headers to add to all requests
    pub custom_headers: Vec<(String, String)>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORIGIN.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_initial_backoff: Duration::from_millis(100),
            retry_max_backoff: Duration::from_secs(30),
            judging_poll_interval: DEFAULT_JUDGING_POLL_INTERVAL,
            user_agent: format!("agent-race-sdk/{}", env!("CARGO_PKG_VERSION")),
            enable_logging: false,
            custom_headers: Vec::new(),
        }
    }
}

impl SdkConfig {
    /// Create a new configuration with the given base URL, used verbatim
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Create a configuration from a loosely formatted origin
    pub fn from_origin(origin: Option<&str>) -> Self {
        Self::new(normalize_origin(origin))
    }

    /// Create a configuration from the `AGENT_RACE_API_URL` environment variable
    pub fn from_env() -> Self {
        let origin = std::env::var(API_URL_ENV).ok();
        Self::from_origin(origin.as_deref())
    }

    /// Create a new builder with the given base URL
    pub fn builder(base_url: impl Into<String>) -> SdkConfigBuilder {
        SdkConfigBuilder {
            config: Self::new(base_url),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the retry backoff configuration
    pub fn with_retry_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_initial_backoff = initial;
        self.retry_max_backoff = max;
        self
    }

    /// Set the judging poll interval
    pub fn with_judging_poll_interval(mut self, interval: Duration) -> Self {
        self.judging_poll_interval = interval;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable request/response logging
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    /// Add a custom header to all requests
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> SdkResult<()> {
        if self.base_url.is_empty() {
            return Err(SdkError::ConfigurationError(
                "Base URL cannot be empty".to_string(),
            ));
        }

        Url::parse(&self.base_url)?;

        if self.timeout.is_zero() {
            return Err(SdkError::ConfigurationError(
                "Timeout cannot be zero".to_string(),
            ));
        }

        if self.judging_poll_interval.is_zero() {
            return Err(SdkError::ConfigurationError(
                "Judging poll interval cannot be zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for SDK configuration
#[derive(Debug, Default)]
pub struct SdkConfigBuilder {
    config: SdkConfig,
}

impl SdkConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the judging poll interval
    pub fn judging_poll_interval(mut self, interval: Duration) -> Self {
        self.config.judging_poll_interval = interval;
        self
    }

    /// Enable logging
    pub fn logging(mut self, enable: bool) -> Self {
        self.config.enable_logging = enable;
        self
    }

    /// Add a custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Build the configuration
    pub fn build(self) -> SdkConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_normalize_origin() {
        assert_eq!(normalize_origin(None), "http://localhost:8000");
        assert_eq!(normalize_origin(Some("")), "http://localhost:8000");
        assert_eq!(normalize_origin(Some("   ")), "http://localhost:8000");
        assert_eq!(normalize_origin(Some(":9000")), "http://localhost:9000");
        assert_eq!(normalize_origin(Some("api.example.com")), "http://api.example.com");
        assert_eq!(
            normalize_origin(Some("https://api.example.com/")),
            "https://api.example.com"
        );
        assert_eq!(
            normalize_origin(Some("http://10.0.0.5:8080")),
            "http://10.0.0.5:8080"
        );
    }

    #[test]
    fn test_normalize_malformed_origin_falls_back() {
        assert_eq!(normalize_origin(Some(":notaport")), DEFAULT_ORIGIN);
        assert_eq!(normalize_origin(Some("http://")), DEFAULT_ORIGIN);
    }

    #[test]
    fn test_default_config() {
        let config = SdkConfig::default();
        assert_eq!(config.base_url, DEFAULT_ORIGIN);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.judging_poll_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_config_builder() {
        let config = SdkConfigBuilder::new()
            .base_url("https://api.example.com")
            .timeout(Duration::from_secs(60))
            .header("X-Trace", "1")
            .build();

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.custom_headers.len(), 1);
    }

    #[test]
    fn test_invalid_config() {
        assert!(SdkConfig::new("").validate().is_err());
        assert!(SdkConfig::new("not a url").validate().is_err());
        assert!(SdkConfig::default()
            .with_judging_poll_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(API_URL_ENV, ":9100");
        assert_eq!(SdkConfig::from_env().base_url, "http://localhost:9100");

        std::env::remove_var(API_URL_ENV);
        assert_eq!(SdkConfig::from_env().base_url, DEFAULT_ORIGIN);
    }
}
