//! Network layer for the tapin check-in agent
//!
//! This crate reports scan events to the remote check-in service over HTTP
//! and turns whatever comes back (or fails to come back) into a
//! [`tapin_core::CheckResult`].
//!
//! # Components
//!
//! - **CheckinClient**: `POST {card_id, timestamp}` with a hard timeout
//! - **CheckinService**: the trait the agent loop depends on
//! - **classify_response**: pure status/body classification
//!
//! # Example
//!
//! ```no_run
//! use tapin_network::{CheckinClient, CheckinClientConfig};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CheckinClientConfig {
//!     endpoint_url: "http://127.0.0.1:3000/api/checkin".to_string(),
//!     timeout: Duration::from_millis(3000),
//!     proxy_from_env: true,
//! };
//!
//! let client = CheckinClient::new(config)?;
//! # Ok(())
//! # }
//! ```

mod classify;
mod client;
mod service;

pub use classify::{classify_response, classify_transport_error, within_deadline};
pub use client::{CheckinClient, CheckinClientConfig, ClientError, HealthStatus};
pub use service::CheckinService;
