//! Agent configuration.
//!
//! Read once at startup and never mutated afterwards. The CLI fills it from
//! arguments and environment; tests construct it directly.

use std::time::Duration;

use url::Url;

use crate::{
    Result,
    constants::{
        DEFAULT_ENDPOINT_URL, DEFAULT_ERROR_RETRY_DELAY_MS, DEFAULT_POST_SCAN_COOLDOWN_MS,
        DEFAULT_REQUEST_TIMEOUT_MS,
    },
    error::Error,
};

/// Immutable runtime configuration for the agent.
///
/// # Example
///
/// ```
/// use tapin_core::AgentConfig;
/// use std::time::Duration;
///
/// let config = AgentConfig::default()
///     .with_endpoint_url("http://checkin.local:3000/api/checkin")
///     .with_request_timeout(Duration::from_secs(2));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.post_scan_cooldown, Duration::from_secs(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Check-in endpoint receiving `POST {card_id, timestamp}`.
    pub endpoint_url: String,

    /// Upper bound on one submission, connect through body.
    pub request_timeout: Duration,

    /// Pause after a resolved scan.
    pub post_scan_cooldown: Duration,

    /// Pause after a reader or transport failure.
    pub error_retry_delay: Duration,

    /// Optional health endpoint probed once at startup.
    pub health_url: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            post_scan_cooldown: Duration::from_millis(DEFAULT_POST_SCAN_COOLDOWN_MS),
            error_retry_delay: Duration::from_millis(DEFAULT_ERROR_RETRY_DELAY_MS),
            health_url: None,
        }
    }
}

impl AgentConfig {
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_post_scan_cooldown(mut self, cooldown: Duration) -> Self {
        self.post_scan_cooldown = cooldown;
        self
    }

    pub fn with_error_retry_delay(mut self, delay: Duration) -> Self {
        self.error_retry_delay = delay;
        self
    }

    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }

    /// Check the configuration before any device is opened.
    ///
    /// # Errors
    /// Returns `Error::Config` if a URL is not `http`/`https` or the request
    /// timeout is zero.
    pub fn validate(&self) -> Result<()> {
        check_url("endpoint", &self.endpoint_url)?;
        if let Some(health_url) = &self.health_url {
            check_url("health", health_url)?;
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_url(name: &str, url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| Error::Config(format!("{name} URL {url:?} is invalid: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
        return Err(Error::Config(format!(
            "{name} URL must start with http:// or https://, got {url:?}"
        )));
    }
    Ok(())
}
