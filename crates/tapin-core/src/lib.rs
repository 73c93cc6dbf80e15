//! Shared model for the tapin check-in agent.
//!
//! Every crate in the workspace speaks in terms of these types: the card
//! identifier produced by a reader, the scan event submitted to the check-in
//! service, the classified result that comes back, and the immutable agent
//! configuration.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::AgentConfig;
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
