//! HTTP client for the check-in service.
//!
//! One `submit()` is one `POST` carrying `{card_id, timestamp}` as JSON.
//! The whole exchange (connect, send, status line, body) must finish
//! within the configured timeout; whatever happens is folded into a
//! [`CheckResult`].
//!
//! # Architecture
//!
//! ```text
//! Agent loop
//!     │
//!     └─> CheckinClient ───(HTTP POST)───> check-in service
//!              │
//!              └─> classify_response / classify_transport_error
//! ```
//!
//! # Design Principles
//!
//! - **No automatic retry**: the agent loop decides what happens next
//! - **One request per scan**: no batching, no queueing
//! - **Never fails**: every outcome is a `CheckResult`
//!
//! # Example Usage
//!
//! ```no_run
//! use tapin_core::{CardId, ScanEvent};
//! use tapin_network::{CheckinClient, CheckinClientConfig, CheckinService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CheckinClient::new(CheckinClientConfig::default())?;
//! let card = CardId::from_hex("04abcdef")?;
//! let result = client.submit(&ScanEvent::now(&card)).await;
//! println!("{result:?}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::Url;
use tapin_core::constants::{DEFAULT_ENDPOINT_URL, DEFAULT_REQUEST_TIMEOUT_MS};
use tapin_core::{AgentConfig, CheckResult, ScanEvent, TransportFailureKind};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::classify::{classify_response, classify_transport_error, within_deadline};
use crate::service::CheckinService;

/// Configuration for the check-in client
///
/// # Example
///
/// ```
/// use tapin_network::CheckinClientConfig;
/// use std::time::Duration;
///
/// let config = CheckinClientConfig {
///     endpoint_url: "http://127.0.0.1:3000/api/checkin".to_string(),
///     timeout: Duration::from_millis(2000),
///     proxy_from_env: false,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct CheckinClientConfig {
    /// Check-in endpoint
    pub endpoint_url: String,

    /// Upper bound on one submission
    pub timeout: Duration,

    /// Honor `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` from the environment
    pub proxy_from_env: bool,
}

impl Default for CheckinClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            proxy_from_env: true,
        }
    }
}

impl From<&AgentConfig> for CheckinClientConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            endpoint_url: config.endpoint_url.clone(),
            timeout: config.request_timeout,
            proxy_from_env: true,
        }
    }
}

/// Errors that can occur while building the client
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint URL does not parse
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP stack could not be initialized
    #[error("HTTP client setup failed: {0}")]
    Setup(#[from] reqwest::Error),
}

/// Result of the optional startup health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// The health endpoint answered 2xx.
    Healthy,
    /// The service answered, but not with success.
    Unhealthy { status_code: u16 },
    /// No answer.
    Unreachable {
        kind: TransportFailureKind,
        detail: String,
    },
}

/// HTTP client for the check-in endpoint
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct CheckinClient {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl CheckinClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid or the HTTP stack
    /// cannot be initialized.
    pub fn new(config: CheckinClientConfig) -> Result<Self, ClientError> {
        let endpoint = parse_url(&config.endpoint_url)?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(concat!("tapin/", env!("CARGO_PKG_VERSION")));
        if !config.proxy_from_env {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;

        debug!(endpoint = %endpoint, timeout_ms = config.timeout.as_millis() as u64, "Check-in client created");

        Ok(Self {
            http,
            endpoint,
            timeout: config.timeout,
        })
    }

    /// The endpoint scans are posted to.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Submit one scan event and classify the outcome.
    ///
    /// Performs exactly one request and never retries.
    pub async fn submit(&self, event: &ScanEvent) -> CheckResult {
        let started = Instant::now();

        let exchange = async {
            let response = self
                .http
                .post(self.endpoint.clone())
                .json(event)
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let outcome = tokio::time::timeout(self.timeout, exchange).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Err(_) => self.timed_out(),
            Ok(Err(e)) => classify_transport_error(&e, self.endpoint()),
            Ok(Ok(_)) if !within_deadline(elapsed, self.timeout) => self.timed_out(),
            Ok(Ok((status, body))) => classify_response(status, &body),
        };

        match &result {
            CheckResult::TransportFailure { kind, detail } => warn!(
                card_id = %event.card_id(),
                kind = %kind,
                elapsed_ms = elapsed.as_millis() as u64,
                "Check-in request failed: {}",
                detail
            ),
            CheckResult::ServiceError { status_code, .. } => warn!(
                card_id = %event.card_id(),
                status = status_code,
                elapsed_ms = elapsed.as_millis() as u64,
                "Check-in service returned an error"
            ),
            other => info!(
                card_id = %event.card_id(),
                outcome = other.label(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Check-in request completed"
            ),
        }

        result
    }

    /// Probe a health endpoint once.
    ///
    /// Used at startup to tell the operator early that the service is down;
    /// the result never stops the agent.
    pub async fn probe_health(&self, url: &str) -> HealthStatus {
        let url = match parse_url(url) {
            Ok(url) => url,
            Err(e) => {
                return HealthStatus::Unreachable {
                    kind: TransportFailureKind::Other,
                    detail: e.to_string(),
                };
            }
        };

        match tokio::time::timeout(self.timeout, self.http.get(url.clone()).send()).await {
            Ok(Ok(response)) if response.status().is_success() => HealthStatus::Healthy,
            Ok(Ok(response)) => HealthStatus::Unhealthy {
                status_code: response.status().as_u16(),
            },
            Ok(Err(e)) => match classify_transport_error(&e, url.as_str()) {
                CheckResult::TransportFailure { kind, detail } => {
                    HealthStatus::Unreachable { kind, detail }
                }
                _ => HealthStatus::Unreachable {
                    kind: TransportFailureKind::Other,
                    detail: e.to_string(),
                },
            },
            Err(_) => HealthStatus::Unreachable {
                kind: TransportFailureKind::Timeout,
                detail: format!("no response within {}ms", self.timeout.as_millis()),
            },
        }
    }

    fn timed_out(&self) -> CheckResult {
        CheckResult::transport(
            TransportFailureKind::Timeout,
            format!("no response within {}ms", self.timeout.as_millis()),
        )
    }
}

impl CheckinService for CheckinClient {
    async fn submit(&self, event: &ScanEvent) -> CheckResult {
        CheckinClient::submit(self, event).await
    }
}

fn parse_url(url: &str) -> Result<Url, ClientError> {
    Url::parse(url).map_err(|e| ClientError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
