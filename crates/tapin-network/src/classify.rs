//! Pure classification of check-in responses.
//!
//! Everything here is a function of its inputs only, so a given
//! `(status, body)` pair always maps to the same [`CheckResult`].

use std::time::Duration;

use serde_json::{Map, Value};
use tapin_core::constants::{ACTION_CHECKIN, UNKNOWN_USER};
use tapin_core::{CheckResult, TransportFailureKind};

/// Classify a complete HTTP response.
///
/// - `200`: decode the JSON body; `action == "checkin"` is a check-in,
///   anything else a check-out. A missing `user` becomes `"Unknown"`, an
///   empty or missing `duration` becomes `None`. A body that is not a JSON
///   object is reported as a service error.
/// - `404`: the card is not registered.
/// - anything else: service error with the body verbatim.
///
/// ```
/// use tapin_core::CheckResult;
/// use tapin_network::classify_response;
///
/// let result = classify_response(200, r#"{"action":"checkin","user":"Alice"}"#);
/// assert_eq!(result, CheckResult::CheckedIn { user: "Alice".to_string() });
/// ```
pub fn classify_response(status: u16, body: &str) -> CheckResult {
    match status {
        200 => match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(fields)) => classify_success(&fields),
            _ => CheckResult::ServiceError {
                status_code: status,
                body: body.to_string(),
            },
        },
        404 => CheckResult::UnknownCard,
        _ => CheckResult::ServiceError {
            status_code: status,
            body: body.to_string(),
        },
    }
}

fn classify_success(fields: &Map<String, Value>) -> CheckResult {
    let user = string_field(fields, "user").unwrap_or(UNKNOWN_USER).to_string();

    if string_field(fields, "action") == Some(ACTION_CHECKIN) {
        return CheckResult::CheckedIn { user };
    }

    let duration = string_field(fields, "duration")
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    CheckResult::CheckedOut { user, duration }
}

fn string_field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    fields.get(name).and_then(Value::as_str)
}

/// Classify a transport-level failure from the HTTP stack.
///
/// Checked in order: timeout, then connection, then anything else.
pub fn classify_transport_error(error: &reqwest::Error, endpoint: &str) -> CheckResult {
    let detail = error_chain(error);
    if error.is_timeout() {
        CheckResult::transport(TransportFailureKind::Timeout, detail)
    } else if error.is_connect() {
        CheckResult::transport(
            TransportFailureKind::Connection,
            format!("cannot connect to {endpoint}: {detail}"),
        )
    } else {
        CheckResult::transport(TransportFailureKind::Other, detail)
    }
}

/// Whether a response that took `elapsed` arrived in time.
///
/// The edge is exclusive: a response at exactly `timeout` is late.
pub fn within_deadline(elapsed: Duration, timeout: Duration) -> bool {
    elapsed < timeout
}

/// Render an error and its sources as one line.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}
