//! Agent loop state machine.
//!
//! This module tracks which phase of the read-report-feedback cycle the
//! agent is in, rejects impossible jumps, and keeps a short history of
//! transitions for diagnostics.
//!
//! # States
//!
//! - `Idle`: between iterations; the shutdown flag is checked here
//! - `AwaitingCard`: blocked in the reader until a card is presented
//! - `Submitting`: one scan event in flight to the check-in service
//! - `Feedback`: result rendered, cooldown or retry delay running
//! - `Terminating`: reader released, loop exiting
//!
//! # Valid Transitions
//!
//! - Idle → AwaitingCard → Submitting → Feedback → Idle
//! - AwaitingCard → Idle (reader failure)
//! - any state except Terminating → Terminating
//!
//! # Examples
//!
//! ```
//! use tapin_agent::{AgentPhase, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! assert_eq!(machine.current_phase(), AgentPhase::Idle);
//!
//! machine.transition_to(AgentPhase::AwaitingCard).unwrap();
//! assert!(machine.transition_to(AgentPhase::Feedback).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use tapin_core::{Error, Result};

/// Maximum number of phase transitions to keep in history.
///
/// A full scan cycle is four transitions, so this covers the last 25 scans.
const MAX_HISTORY_SIZE: usize = 100;

/// Phase of the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// Between iterations.
    Idle,

    /// Waiting for a card presentation.
    AwaitingCard,

    /// A scan event is being submitted.
    Submitting,

    /// Rendering the result and waiting out the following delay.
    Feedback,

    /// Releasing the reader and stopping. Terminal.
    Terminating,
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            AgentPhase::Idle => "Idle",
            AgentPhase::AwaitingCard => "AwaitingCard",
            AgentPhase::Submitting => "Submitting",
            AgentPhase::Feedback => "Feedback",
            AgentPhase::Terminating => "Terminating",
        };
        write!(f, "{}", phase)
    }
}

impl AgentPhase {
    /// Check if a transition to `target` is valid from this phase.
    ///
    /// ```
    /// use tapin_agent::AgentPhase;
    ///
    /// assert!(AgentPhase::Idle.can_transition_to(&AgentPhase::AwaitingCard));
    /// assert!(AgentPhase::Submitting.can_transition_to(&AgentPhase::Terminating));
    /// assert!(!AgentPhase::Terminating.can_transition_to(&AgentPhase::Idle));
    /// ```
    pub fn can_transition_to(&self, target: &AgentPhase) -> bool {
        matches!(
            (self, target),
            (AgentPhase::Idle, AgentPhase::AwaitingCard)
                | (AgentPhase::AwaitingCard, AgentPhase::Submitting | AgentPhase::Idle)
                | (AgentPhase::Submitting, AgentPhase::Feedback)
                | (AgentPhase::Feedback, AgentPhase::Idle)
                | (
                    AgentPhase::Idle
                        | AgentPhase::AwaitingCard
                        | AgentPhase::Submitting
                        | AgentPhase::Feedback,
                    AgentPhase::Terminating
                )
        )
    }

    /// Whether the loop has stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentPhase::Terminating)
    }
}

/// A single phase transition with timestamp.
///
/// The timestamp is process-local and not serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// The phase transitioned from.
    pub from: AgentPhase,

    /// The phase transitioned to.
    pub to: AgentPhase,

    /// When the transition occurred.
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
}

impl StateTransition {
    /// Create a new transition record stamped now.
    pub fn new(from: AgentPhase, to: AgentPhase) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    /// Time since this transition occurred.
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// State machine for the agent loop.
///
/// Owned by the loop and never shared, so it carries no synchronization.
///
/// # Examples
///
/// ```
/// use tapin_agent::{AgentPhase, StateMachine};
///
/// let mut machine = StateMachine::new();
/// machine.transition_to(AgentPhase::AwaitingCard).unwrap();
/// machine.transition_to(AgentPhase::Submitting).unwrap();
/// machine.transition_to(AgentPhase::Feedback).unwrap();
/// machine.transition_to(AgentPhase::Idle).unwrap();
///
/// assert_eq!(machine.history().len(), 4);
/// ```
#[derive(Debug)]
pub struct StateMachine {
    /// Current phase.
    current_phase: AgentPhase,

    /// When the current phase was entered.
    phase_entered_at: Instant,

    /// Recent transitions (limited to MAX_HISTORY_SIZE).
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a new state machine in the Idle phase.
    pub fn new() -> Self {
        Self {
            current_phase: AgentPhase::Idle,
            phase_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    /// Current phase.
    pub fn current_phase(&self) -> AgentPhase {
        self.current_phase
    }

    /// Time spent in the current phase.
    pub fn time_in_current_phase(&self) -> Duration {
        self.phase_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Get the last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .cloned()
            .collect()
    }

    /// Transition to a new phase, validating the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if `new_phase` is not
    /// reachable from the current phase. The machine is left unchanged.
    pub fn transition_to(&mut self, new_phase: AgentPhase) -> Result<StateTransition> {
        if !self.current_phase.can_transition_to(&new_phase) {
            return Err(Error::InvalidStateTransition {
                from: self.current_phase.to_string(),
                to: new_phase.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_phase, new_phase);
        self.perform_phase_change(new_phase, transition.clone());

        Ok(transition)
    }

    /// Move to `Terminating` from wherever the loop is.
    ///
    /// Returns `None` if the machine already terminated.
    pub fn terminate(&mut self) -> Option<StateTransition> {
        self.transition_to(AgentPhase::Terminating).ok()
    }

    fn perform_phase_change(&mut self, new_phase: AgentPhase, transition: StateTransition) {
        self.current_phase = new_phase;
        self.phase_entered_at = Instant::now();

        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
