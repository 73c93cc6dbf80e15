use crate::{
    Result,
    constants::{MAX_UID_LENGTH, MIN_UID_LENGTH},
    error::Error,
};
use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use serde::{Serialize, Serializer};
use std::fmt;

/// Card unique identifier as reported by the reader (4-10 bytes).
///
/// Rendered as lowercase hexadecimal for transport, which is the format the
/// check-in service stores in its registration table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardId(Vec<u8>);

impl CardId {
    /// Create a card id from raw UID bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardId` if the length is outside 4-10 bytes.
    pub fn new(uid: impl Into<Vec<u8>>) -> Result<Self> {
        let uid = uid.into();
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&uid.len()) {
            return Err(Error::InvalidCardId(format!(
                "UID length must be between {MIN_UID_LENGTH} and {MAX_UID_LENGTH} bytes, got {}",
                uid.len()
            )));
        }
        Ok(Self(uid))
    }

    /// Parse a card id from hexadecimal text.
    ///
    /// Upper and lower case digits are accepted, as are `:`, `-` and space
    /// separators between bytes (`04:AB:CD:EF`).
    ///
    /// ```
    /// use tapin_core::CardId;
    ///
    /// let id = CardId::from_hex("04:AB:CD:EF").unwrap();
    /// assert_eq!(id.to_hex(), "04abcdef");
    /// ```
    pub fn from_hex(text: &str) -> Result<Self> {
        let digits: String = text
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | ' '))
            .collect();
        let bytes = hex::decode(&digits)
            .map_err(|e| Error::InvalidCardId(format!("{text:?} is not hexadecimal: {e}")))?;
        Self::new(bytes)
    }

    /// Raw UID bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hexadecimal rendering used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for CardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// A single card presentation, ready to be submitted.
///
/// Serializes to the request body the check-in endpoint expects:
///
/// ```
/// use chrono::{FixedOffset, TimeZone};
/// use tapin_core::{CardId, ScanEvent};
///
/// let at = FixedOffset::east_opt(0).unwrap()
///     .with_ymd_and_hms(2025, 10, 16, 9, 30, 0).unwrap();
/// let event = ScanEvent::new(&CardId::from_hex("04abcdef").unwrap(), at);
///
/// assert_eq!(event.card_id(), "04abcdef");
/// assert_eq!(event.timestamp(), "2025-10-16T09:30:00.000+00:00");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEvent {
    card_id: String,
    #[serde(rename = "timestamp", serialize_with = "serialize_timestamp")]
    scanned_at: DateTime<FixedOffset>,
}

impl ScanEvent {
    /// Create a scan event for a card seen at `scanned_at`.
    pub fn new(card: &CardId, scanned_at: DateTime<FixedOffset>) -> Self {
        Self {
            card_id: card.to_hex(),
            scanned_at,
        }
    }

    /// Create a scan event stamped with the current local time.
    pub fn now(card: &CardId) -> Self {
        Self::new(card, Local::now().fixed_offset())
    }

    /// Lowercase hex card identifier.
    pub fn card_id(&self) -> &str {
        &self.card_id
    }

    /// When the card was detected.
    pub fn scanned_at(&self) -> DateTime<FixedOffset> {
        self.scanned_at
    }

    /// ISO-8601 timestamp as sent to the service.
    pub fn timestamp(&self) -> String {
        self.scanned_at.to_rfc3339_opts(SecondsFormat::Millis, false)
    }
}

fn serialize_timestamp<S: Serializer>(
    at: &DateTime<FixedOffset>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, false))
}

/// Why a request never produced a complete response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFailureKind {
    /// The connection could not be established.
    Connection,
    /// No complete response arrived within the request timeout.
    Timeout,
    /// Any other transport-level failure.
    Other,
}

impl fmt::Display for TransportFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            TransportFailureKind::Connection => "connection",
            TransportFailureKind::Timeout => "timeout",
            TransportFailureKind::Other => "other",
        };
        write!(f, "{kind}")
    }
}

/// Outcome of one submission attempt.
///
/// Every attempt produces exactly one of these. None of them is an error in
/// the `Result` sense; they are rendered to the operator and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    /// The service opened a session for the card holder.
    CheckedIn { user: String },

    /// The service closed the card holder's session.
    CheckedOut {
        user: String,
        duration: Option<String>,
    },

    /// No registration exists for this card.
    UnknownCard,

    /// The service answered with an unexpected status.
    ServiceError { status_code: u16, body: String },

    /// The request never completed.
    TransportFailure {
        kind: TransportFailureKind,
        detail: String,
    },
}

impl CheckResult {
    /// Build a transport failure.
    pub fn transport(kind: TransportFailureKind, detail: impl Into<String>) -> Self {
        Self::TransportFailure {
            kind,
            detail: detail.into(),
        }
    }

    /// The service produced a complete answer (anything but a transport failure).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::TransportFailure { .. })
    }

    /// The scan did not result in a check-in or check-out.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::CheckedIn { .. } | Self::CheckedOut { .. })
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CheckedIn { .. } => "checked_in",
            Self::CheckedOut { .. } => "checked_out",
            Self::UnknownCard => "unknown_card",
            Self::ServiceError { .. } => "service_error",
            Self::TransportFailure { .. } => "transport_failure",
        }
    }
}

/// Process-wide lifecycle flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AgentState {
    /// Accepting scans.
    #[default]
    Running,
    /// Operator asked to stop; no further scans are accepted.
    ShuttingDown,
}

impl AgentState {
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AgentState::Running => write!(f, "Running"),
            AgentState::ShuttingDown => write!(f, "ShuttingDown"),
        }
    }
}
