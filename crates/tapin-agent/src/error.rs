//! Errors that stop the agent loop.
//!
//! Everything else (reader failures mid-run, transport failures, service
//! errors) is handled inside the loop and never surfaces here.

use tapin_hardware::HardwareError;

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The reader could not be opened at startup.
    #[error("{0}")]
    DeviceUnavailable(HardwareError),

    /// The loop attempted an impossible phase change.
    #[error(transparent)]
    State(#[from] tapin_core::Error),
}

impl AgentError {
    /// Device name when the reader was missing.
    pub fn device(&self) -> Option<&str> {
        match self {
            AgentError::DeviceUnavailable(HardwareError::Unavailable { device, .. }) => {
                Some(device)
            }
            _ => None,
        }
    }
}
