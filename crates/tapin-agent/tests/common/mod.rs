//! Shared fixtures for agent loop tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tapin_agent::ShutdownTrigger;
use tapin_core::{CheckResult, ScanEvent};
use tapin_network::CheckinService;
use tokio::time::Instant;

/// One call the fake service received.
#[derive(Debug, Clone)]
pub struct Call {
    pub card_id: String,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    script: Mutex<VecDeque<CheckResult>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicBool,
    overlapped: AtomicBool,
    shutdown_on_submit: Mutex<Option<ShutdownTrigger>>,
    latency: Mutex<Duration>,
}

/// Scripted check-in service.
///
/// Answers from its script in order, then `CheckedIn { user: "Alice" }`.
#[derive(Debug, Clone, Default)]
pub struct FakeService {
    inner: Arc<Inner>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(results: impl IntoIterator<Item = CheckResult>) -> Self {
        let service = Self::default();
        service.inner.script.lock().unwrap().extend(results);
        service
    }

    /// Request shutdown from inside the next submission.
    pub fn shutdown_on_submit(&self, trigger: ShutdownTrigger) {
        *self.inner.shutdown_on_submit.lock().unwrap() = Some(trigger);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock().unwrap() = latency;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    /// Whether two submissions were ever in flight together.
    pub fn overlapped(&self) -> bool {
        self.inner.overlapped.load(Ordering::SeqCst)
    }
}

impl CheckinService for FakeService {
    async fn submit(&self, event: &ScanEvent) -> CheckResult {
        if self.inner.in_flight.swap(true, Ordering::SeqCst) {
            self.inner.overlapped.store(true, Ordering::SeqCst);
        }
        self.inner.calls.lock().unwrap().push(Call {
            card_id: event.card_id().to_string(),
            at: Instant::now(),
        });

        let latency = *self.inner.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(trigger) = self.inner.shutdown_on_submit.lock().unwrap().take() {
            trigger.shutdown();
        }

        self.inner.in_flight.store(false, Ordering::SeqCst);
        self.inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| CheckResult::CheckedIn {
                user: "Alice".to_string(),
            })
    }
}

/// Poll until `service` has seen `count` calls.
pub async fn wait_for_calls(service: &FakeService, count: usize) {
    for _ in 0..100_000 {
        if service.call_count() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {count} submissions, saw {}",
        service.call_count()
    );
}
