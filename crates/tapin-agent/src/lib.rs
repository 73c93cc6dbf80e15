//! Agent loop for the tapin check-in agent.
//!
//! This crate ties a [`tapin_hardware::CardReader`] to a
//! [`tapin_network::CheckinService`]: it waits for a card, submits the scan,
//! renders the result for the operator, waits out a cooldown or retry delay,
//! and repeats until the operator interrupts it.
//!
//! # Components
//!
//! - **Agent**: the sequential read-report-feedback loop
//! - **StateMachine**: phase tracking with validated transitions
//! - **shutdown_channel**: the process-wide running/shutting-down flag
//! - **Pause**: cooldown and retry delay selection
//! - **Feedback**: operator output as data, plus console and memory sinks

pub mod agent;
pub mod error;
pub mod feedback;
pub mod policy;
pub mod shutdown;
pub mod state_machine;

pub use agent::{Agent, RunSummary};
pub use error::{AgentError, Result};
pub use feedback::{ConsoleSink, Feedback, FeedbackLine, FeedbackSink, LineKind, MemorySink};
pub use policy::Pause;
pub use shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel};
pub use state_machine::{AgentPhase, StateMachine, StateTransition};
