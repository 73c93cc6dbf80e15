//! Delay policy between iterations.

use std::time::Duration;

use tapin_core::{AgentConfig, CheckResult};

/// Which pause follows an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// After a resolved result, so a card left in the field is not re-read.
    Cooldown,
    /// After a reader or transport failure, so the loop does not spin.
    RetryDelay,
}

impl Pause {
    /// Pause after a submission.
    ///
    /// ```
    /// use tapin_agent::Pause;
    /// use tapin_core::CheckResult;
    ///
    /// assert_eq!(Pause::after(&CheckResult::UnknownCard), Pause::Cooldown);
    /// ```
    pub fn after(result: &CheckResult) -> Self {
        if result.is_resolved() {
            Pause::Cooldown
        } else {
            Pause::RetryDelay
        }
    }

    /// Pause after the reader failed.
    pub fn after_device_failure() -> Self {
        Pause::RetryDelay
    }

    /// Configured length of this pause.
    pub fn duration(self, config: &AgentConfig) -> Duration {
        match self {
            Pause::Cooldown => config.post_scan_cooldown,
            Pause::RetryDelay => config.error_retry_delay,
        }
    }
}
