//! Error types for card reader operations.
//!
//! Two classes matter to the agent: [`HardwareError::Unavailable`] means the
//! device could not be opened at all (fatal at startup), everything else is a
//! device failure that the agent waits out and retries.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during card reader operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device could not be opened.
    #[error("Device unavailable: {device} ({reason})")]
    Unavailable { device: String, reason: String },

    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation attempted on a reader that is not open.
    #[error("Device not open: {device}")]
    NotOpen { device: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new unavailable-device error.
    pub fn unavailable(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new not-open error.
    pub fn not_open(device: impl Into<String>) -> Self {
        Self::NotOpen {
            device: device.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// The device could not be opened, as opposed to failing while in use.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
