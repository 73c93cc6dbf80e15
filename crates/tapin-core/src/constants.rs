//! Core constants for the check-in agent.
//!
//! Defaults match the behavior the field units have always shipped with:
//! a five second request timeout, a three second cooldown after each
//! resolved scan, and a one second back-off after a failure.
//!
//! ```
//! use tapin_core::constants::*;
//! use std::time::Duration;
//!
//! let timeout = Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS);
//! assert_eq!(timeout.as_secs(), 5);
//! ```

// ============================================================================
// Card Identifiers
// ============================================================================

/// Minimum UID length in bytes (per ISO 14443 specification).
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum UID length in bytes (per ISO 14443 specification).
pub const MAX_UID_LENGTH: usize = 10;

// ============================================================================
// Check-in Service
// ============================================================================

/// Endpoint used when none is configured.
///
/// Points at a local development server on purpose so an unconfigured unit
/// never reports scans to a production service.
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:3000/api/checkin";

/// `action` value the service uses for a check-in.
pub const ACTION_CHECKIN: &str = "checkin";

/// User name reported when the service omits the `user` field.
pub const UNKNOWN_USER: &str = "Unknown";

// ============================================================================
// Timing (milliseconds)
// ============================================================================

/// Upper bound on a single check-in request.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Delay after a resolved scan, so a card left on the reader is not re-read.
pub const DEFAULT_POST_SCAN_COOLDOWN_MS: u64 = 3000;

/// Delay after a reader or transport failure.
pub const DEFAULT_ERROR_RETRY_DELAY_MS: u64 = 1000;
