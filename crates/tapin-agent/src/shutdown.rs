//! Operator interrupt plumbing.
//!
//! The process-wide [`AgentState`] lives in a `watch` channel. The signal
//! handler holds the [`ShutdownTrigger`], the loop holds the
//! [`ShutdownSignal`] and checks it between iterations and while it waits.

use tapin_core::AgentState;
use tokio::sync::watch;

/// Create a linked trigger/signal pair, starting in `Running`.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(AgentState::Running);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Sending half: flips the agent to `ShuttingDown`.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<AgentState>,
}

impl ShutdownTrigger {
    /// Request shutdown. Repeated calls are no-ops.
    pub fn shutdown(&self) {
        self.tx.send_if_modified(|state| {
            if state.is_running() {
                *state = AgentState::ShuttingDown;
                true
            } else {
                false
            }
        });
    }

    /// Current state as seen by the trigger.
    pub fn state(&self) -> AgentState {
        *self.tx.borrow()
    }
}

/// Receiving half, owned by the agent loop.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<AgentState>,
}

impl ShutdownSignal {
    /// Current state.
    pub fn state(&self) -> AgentState {
        *self.rx.borrow()
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        !self.state().is_running()
    }

    /// Resolve once shutdown is requested.
    ///
    /// Cancel-safe. If every trigger is dropped without requesting shutdown
    /// this never resolves.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|state| !state.is_running()).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
