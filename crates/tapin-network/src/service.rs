//! The seam between the agent loop and the check-in backend.

#![allow(async_fn_in_trait)]

use tapin_core::{CheckResult, ScanEvent};

/// Something that turns a scan event into a classified result.
///
/// Implementations never fail in the `Result` sense: transport problems and
/// unexpected answers are themselves [`CheckResult`] variants. An
/// implementation performs at most one attempt per call; retry policy
/// belongs to the caller.
pub trait CheckinService {
    async fn submit(&self, event: &ScanEvent) -> CheckResult;
}
