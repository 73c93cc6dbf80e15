//! The read-report-feedback loop.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────── ShutdownSignal ────────────┐
//!                 v                                        v
//! CardReader ──await_card──> Agent ──submit──> CheckinService
//!                              │
//!                              └──emit──> FeedbackSink
//! ```
//!
//! The loop is strictly sequential: one card is read, submitted, rendered
//! and waited out before the next read starts. The reader is opened once
//! before the loop and released on every way out of it.

use serde::Serialize;
use tapin_core::{AgentConfig, CheckResult, ScanEvent, TransportFailureKind};
use tapin_hardware::{CardReader, HardwareError};
use tapin_network::CheckinService;
use tracing::{debug, error, info, warn};

use crate::error::{AgentError, Result};
use crate::feedback::{Feedback, FeedbackSink};
use crate::policy::Pause;
use crate::shutdown::ShutdownSignal;
use crate::state_machine::{AgentPhase, StateMachine, StateTransition};

/// Counters for one run of the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Cards read from the reader.
    pub scans: u64,
    /// Submission attempts made.
    pub submissions: u64,
    pub checked_in: u64,
    pub checked_out: u64,
    pub unknown_cards: u64,
    pub service_errors: u64,
    pub transport_failures: u64,
    /// Reader failures while running, re-open failures included.
    pub device_failures: u64,
}

impl RunSummary {
    fn record(&mut self, result: &CheckResult) {
        self.submissions += 1;
        match result {
            CheckResult::CheckedIn { .. } => self.checked_in += 1,
            CheckResult::CheckedOut { .. } => self.checked_out += 1,
            CheckResult::UnknownCard => self.unknown_cards += 1,
            CheckResult::ServiceError { .. } => self.service_errors += 1,
            CheckResult::TransportFailure { .. } => self.transport_failures += 1,
        }
    }
}

/// How one pass through the loop ended.
enum Step {
    Continue,
    Stop,
}

/// Check-in agent.
///
/// Generic over the reader, the check-in service and the feedback sink so
/// the loop runs the same against hardware, HTTP and the console as it does
/// against mocks.
///
/// # Examples
///
/// ```no_run
/// use tapin_agent::{Agent, ConsoleSink, shutdown_channel};
/// use tapin_core::AgentConfig;
/// use tapin_hardware::LineReader;
/// use tapin_network::{CheckinClient, CheckinClientConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AgentConfig::default();
/// let client = CheckinClient::new(CheckinClientConfig::from(&config))?;
/// let (trigger, signal) = shutdown_channel();
///
/// let mut agent = Agent::new(LineReader::stdin(), client, ConsoleSink::new(), config, signal);
/// let summary = agent.run().await?;
/// println!("{} scans", summary.scans);
/// # drop(trigger);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Agent<R, S, F> {
    reader: R,
    service: S,
    sink: F,
    config: AgentConfig,
    shutdown: ShutdownSignal,
    machine: StateMachine,
    summary: RunSummary,
}

impl<R, S, F> Agent<R, S, F>
where
    R: CardReader,
    S: CheckinService,
    F: FeedbackSink,
{
    pub fn new(reader: R, service: S, sink: F, config: AgentConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            reader,
            service,
            sink,
            config,
            shutdown,
            machine: StateMachine::new(),
            summary: RunSummary::default(),
        }
    }

    /// Current phase of the loop.
    pub fn phase(&self) -> AgentPhase {
        self.machine.current_phase()
    }

    /// The phase state machine, for its transition history.
    pub fn state_machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Counters so far.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The reader, e.g. to inspect it after the run.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Run until shutdown is requested.
    ///
    /// Returns the run's counters when the loop stops because of an operator
    /// interrupt. The reader is released before this returns, whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// - `AgentError::DeviceUnavailable` if the reader cannot be opened at
    ///   startup
    /// - `AgentError::State` if the loop is run again after it terminated
    pub async fn run(&mut self) -> Result<RunSummary> {
        if self.machine.current_phase().is_terminal() {
            return Err(AgentError::State(tapin_core::Error::InvalidStateTransition {
                from: AgentPhase::Terminating.to_string(),
                to: AgentPhase::Idle.to_string(),
            }));
        }

        let reader = self.reader.info();
        match self.open_reader().await {
            None => {
                info!(device = %reader.name, "Shutdown requested while opening card reader");
                self.terminate().await;
                return Ok(self.summary.clone());
            }
            Some(Err(e)) => {
                error!(device = %reader.name, error = %e, "Card reader unavailable");
                self.sink.emit(&Feedback::reader_unavailable(&e));
                self.machine.terminate();
                return Err(AgentError::DeviceUnavailable(e));
            }
            Some(Ok(())) => {}
        }

        info!(
            device = %reader.name,
            endpoint = %self.config.endpoint_url,
            "Agent started, waiting for cards"
        );
        self.sink
            .emit(&Feedback::ready(&reader, &self.config.endpoint_url));

        let outcome = self.run_loop().await;
        self.terminate().await;

        outcome.map(|()| self.summary.clone())
    }

    async fn run_loop(&mut self) -> Result<()> {
        loop {
            match self.iterate().await? {
                Step::Continue => {}
                Step::Stop => return Ok(()),
            }
        }
    }

    /// One pass from `Idle` back to `Idle`.
    async fn iterate(&mut self) -> Result<Step> {
        if self.shutdown.is_shutting_down() {
            return Ok(Step::Stop);
        }

        if !self.reader.is_open() {
            match self.open_reader().await {
                None => return Ok(Step::Stop),
                Some(Err(e)) => {
                    self.device_failure(&e);
                    return Ok(self.pause(Pause::after_device_failure()).await);
                }
                Some(Ok(())) => {
                    info!(device = %self.reader.info().name, "Card reader re-opened");
                }
            }
        }

        self.transition(AgentPhase::AwaitingCard)?;
        let read = tokio::select! {
            biased;
            _ = self.shutdown.wait() => None,
            read = self.reader.await_card() => Some(read),
        };

        let card = match read {
            None => return Ok(Step::Stop),
            Some(Ok(card)) => card,
            Some(Err(e)) => {
                self.transition(AgentPhase::Idle)?;
                self.device_failure(&e);
                self.release_reader().await;
                return Ok(self.pause(Pause::after_device_failure()).await);
            }
        };

        let event = ScanEvent::now(&card);
        self.summary.scans += 1;
        info!(card_id = %event.card_id(), timestamp = %event.timestamp(), "Card detected");
        self.sink.emit(&Feedback::card_detected(&event));

        self.transition(AgentPhase::Submitting)?;
        let result = self.service.submit(&event).await;
        self.summary.record(&result);
        log_result(&event, &result);

        self.transition(AgentPhase::Feedback)?;
        self.sink
            .emit(&Feedback::for_result(&result, &self.config.endpoint_url));
        let step = self.pause(Pause::after(&result)).await;

        if let Step::Continue = step {
            self.transition(AgentPhase::Idle)?;
        }
        Ok(step)
    }

    /// Open the reader unless shutdown arrives first (`None`).
    ///
    /// Opening a FIFO or a busy device can block indefinitely.
    async fn open_reader(&mut self) -> Option<tapin_hardware::Result<()>> {
        tokio::select! {
            biased;
            opened = self.reader.open() => Some(opened),
            _ = self.shutdown.wait() => None,
        }
    }

    fn device_failure(&mut self, error: &HardwareError) {
        self.summary.device_failures += 1;
        warn!(
            device = %self.reader.info().name,
            error = %error,
            retry_in_ms = self.config.error_retry_delay.as_millis() as u64,
            "Card reader failure"
        );
        self.sink.emit(&Feedback::device_failure(error));
    }

    /// Wait out a pause unless shutdown arrives first.
    async fn pause(&mut self, pause: Pause) -> Step {
        let duration = pause.duration(&self.config);
        debug!(pause = ?pause, duration_ms = duration.as_millis() as u64, "Pausing");

        tokio::select! {
            biased;
            _ = self.shutdown.wait() => Step::Stop,
            _ = tokio::time::sleep(duration) => Step::Continue,
        }
    }

    async fn terminate(&mut self) {
        if let Some(transition) = self.machine.terminate() {
            debug!(from = %transition.from, "Agent terminating");
        }
        if self.shutdown.is_shutting_down() {
            info!("Shutdown requested, releasing card reader");
            self.sink.emit(&Feedback::shutting_down());
        }
        if self.release_reader().await {
            self.sink.emit(&Feedback::reader_closed());
        }
        info!(
            scans = self.summary.scans,
            device_failures = self.summary.device_failures,
            transport_failures = self.summary.transport_failures,
            "Agent stopped"
        );
    }

    /// Close the reader if it is open. Returns whether it was open.
    async fn release_reader(&mut self) -> bool {
        if !self.reader.is_open() {
            return false;
        }
        if let Err(e) = self.reader.close().await {
            warn!(device = %self.reader.info().name, error = %e, "Error while closing card reader");
        }
        true
    }

    fn transition(&mut self, phase: AgentPhase) -> Result<StateTransition> {
        let transition = self.machine.transition_to(phase)?;
        debug!(from = %transition.from, to = %transition.to, "Phase change");
        Ok(transition)
    }
}

fn log_result(event: &ScanEvent, result: &CheckResult) {
    match result {
        CheckResult::CheckedIn { user } => {
            info!(card_id = %event.card_id(), user = %user, "Checked in")
        }
        CheckResult::CheckedOut { user, duration } => info!(
            card_id = %event.card_id(),
            user = %user,
            duration = duration.as_deref().unwrap_or(""),
            "Checked out"
        ),
        CheckResult::UnknownCard => warn!(card_id = %event.card_id(), "Card not registered"),
        CheckResult::ServiceError { status_code, body } => warn!(
            card_id = %event.card_id(),
            status = status_code,
            body = %body,
            "Check-in service error"
        ),
        CheckResult::TransportFailure { kind, detail } => {
            let what = match kind {
                TransportFailureKind::Connection => "server unreachable",
                TransportFailureKind::Timeout => "server too slow",
                TransportFailureKind::Other => "request failed",
            };
            warn!(card_id = %event.card_id(), kind = %kind, detail = %detail, "Check-in {}", what)
        }
    }
}
