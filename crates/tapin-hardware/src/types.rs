//! Reader metadata shared by all reader implementations.

use serde::{Deserialize, Serialize};

/// Card reader information.
///
/// Contains reader metadata such as its display name and the protocols
/// it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Reader name (e.g., "ACS ACR122U PICC Interface 00 00").
    pub name: String,

    /// List of supported protocols (e.g., ["ISO14443A", "ISO14443B"]).
    pub protocols: Vec<String>,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(name: impl Into<String>, protocols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            protocols,
        }
    }
}
