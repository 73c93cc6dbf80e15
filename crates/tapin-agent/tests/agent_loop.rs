//! Integration tests for the agent loop
//!
//! The loop runs against a mock reader and a scripted check-in service on a
//! paused clock, so cooldowns and retry delays are observed exactly.

mod common;

use std::time::Duration;

use common::{FakeService, wait_for_calls};
use proptest::prelude::*;
use tapin_agent::{Agent, AgentError, AgentPhase, MemorySink, shutdown_channel};
use tapin_core::{AgentConfig, CheckResult, TransportFailureKind};
use tapin_hardware::mock::MockReader;

const CARD_A: [u8; 4] = [0x04, 0xA2, 0x2B, 0x9C];
const CARD_B: [u8; 7] = [0x04, 0x5A, 0x2B, 0x92, 0xC1, 0x6F, 0x80];

fn config() -> AgentConfig {
    AgentConfig::default()
        .with_post_scan_cooldown(Duration::from_secs(3))
        .with_error_retry_delay(Duration::from_secs(1))
}

/// Scenario A: a check-in is rendered with the user's name
#[tokio::test(start_paused = true)]
async fn test_checkin_is_rendered() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::new();
    let sink = MemorySink::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), sink.clone(), config(), signal);

    let (result, ()) = tokio::join!(agent.run(), async {
        handle.present_card(CARD_A.to_vec()).await.unwrap();
        wait_for_calls(&service, 1).await;
        trigger.shutdown();
    });

    let summary = result.unwrap();
    assert_eq!(summary.scans, 1);
    assert_eq!(summary.checked_in, 1);
    assert!(sink.contains("Card ID: 04a22b9c"));
    assert!(sink.contains("CHECK IN: Alice"));
    assert_eq!(service.calls()[0].card_id, "04a22b9c");
}

/// Scenario C: an unknown card prompts registration and the loop goes on
#[tokio::test(start_paused = true)]
async fn test_unknown_card_continues() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::with_script([CheckResult::UnknownCard]);
    let sink = MemorySink::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), sink.clone(), config(), signal);

    let (result, ()) = tokio::join!(agent.run(), async {
        handle.present_card(CARD_A.to_vec()).await.unwrap();
        handle.present_card(CARD_B.to_vec()).await.unwrap();
        wait_for_calls(&service, 2).await;
        trigger.shutdown();
    });

    let summary = result.unwrap();
    assert_eq!(summary.unknown_cards, 1);
    assert_eq!(summary.checked_in, 1);
    assert!(sink.contains("Card not registered"));
    assert!(sink.contains("Please add this card in the web interface"));
}

/// Scenario F: a service error shows status and body
#[tokio::test(start_paused = true)]
async fn test_service_error_is_rendered_verbatim() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::with_script([CheckResult::ServiceError {
        status_code: 500,
        body: "internal error".to_string(),
    }]);
    let sink = MemorySink::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), sink.clone(), config(), signal);

    let (result, ()) = tokio::join!(agent.run(), async {
        handle.present_card(CARD_A.to_vec()).await.unwrap();
        wait_for_calls(&service, 1).await;
        trigger.shutdown();
    });

    assert_eq!(result.unwrap().service_errors, 1);
    assert!(sink.contains("Error: 500"));
    assert!(sink.contains("internal error"));
}

/// Scenario D: a transport failure waits the retry delay, then reads on
#[tokio::test(start_paused = true)]
async fn test_transport_failure_uses_retry_delay() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::with_script([CheckResult::transport(
        TransportFailureKind::Connection,
        "connection refused",
    )]);
    let sink = MemorySink::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), sink.clone(), config(), signal);

    let (result, ()) = tokio::join!(agent.run(), async {
        handle.present_card(CARD_A.to_vec()).await.unwrap();
        handle.present_card(CARD_B.to_vec()).await.unwrap();
        wait_for_calls(&service, 2).await;
        trigger.shutdown();
    });

    let summary = result.unwrap();
    assert_eq!(summary.transport_failures, 1);
    assert_eq!(summary.checked_in, 1);
    assert!(sink.contains("Cannot connect to server"));

    let calls = service.calls();
    let gap = calls[1].at - calls[0].at;
    assert!(gap >= Duration::from_secs(1), "gap was {gap:?}");
    assert!(gap < Duration::from_secs(3), "gap was {gap:?}");
    assert_eq!(handle.open_count(), 1);
}

/// A resolved result waits the full cooldown before the next read
#[tokio::test(start_paused = true)]
async fn test_resolved_result_uses_cooldown() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), MemorySink::new(), config(), signal);

    let (result, ()) = tokio::join!(agent.run(), async {
        handle.present_card(CARD_A.to_vec()).await.unwrap();
        handle.present_card(CARD_A.to_vec()).await.unwrap();
        wait_for_calls(&service, 2).await;
        trigger.shutdown();
    });

    assert_eq!(result.unwrap().submissions, 2);
    let calls = service.calls();
    assert!(calls[1].at - calls[0].at >= Duration::from_secs(3));
}

/// Scenario E: an interrupt while waiting for a card releases the reader once
#[tokio::test(start_paused = true)]
async fn test_interrupt_while_idle() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::new();
    let sink = MemorySink::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), sink.clone(), config(), signal);

    let (result, ()) = tokio::join!(agent.run(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.shutdown();
    });

    assert_eq!(result.unwrap().scans, 0);
    assert_eq!(agent.phase(), AgentPhase::Terminating);
    assert_eq!(handle.open_count(), 1);
    assert_eq!(handle.release_count(), 1);
    assert_eq!(service.call_count(), 0);
    assert!(sink.contains("Shutting down card reader..."));
    assert!(sink.contains("Card reader closed"));

    let last = agent.state_machine().history().back().unwrap().clone();
    assert_eq!(last.from, AgentPhase::AwaitingCard);
    assert_eq!(last.to, AgentPhase::Terminating);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_during_cooldown_stops_early() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), MemorySink::new(), config(), signal);
    let started = tokio::time::Instant::now();

    let (result, ()) = tokio::join!(agent.run(), async {
        handle.present_card(CARD_A.to_vec()).await.unwrap();
        wait_for_calls(&service, 1).await;
        trigger.shutdown();
    });

    assert!(result.is_ok());
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(handle.release_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_run() {
    let (reader, handle) = MockReader::new();
    let (trigger, signal) = shutdown_channel();
    trigger.shutdown();
    let mut agent = Agent::new(reader, FakeService::new(), MemorySink::new(), config(), signal);

    handle.present_card(CARD_A.to_vec()).await.unwrap();
    let summary = agent.run().await.unwrap();

    assert_eq!(summary.scans, 0);
    assert_eq!(handle.release_count(), 1);
}

/// The in-flight result is rendered even when shutdown arrives mid-request
#[tokio::test(start_paused = true)]
async fn test_in_flight_result_is_rendered() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::new();
    service.set_latency(Duration::from_millis(500));
    let sink = MemorySink::new();
    let (trigger, signal) = shutdown_channel();
    service.shutdown_on_submit(trigger.clone());
    let mut agent = Agent::new(reader, service.clone(), sink.clone(), config(), signal);

    handle.present_card(CARD_A.to_vec()).await.unwrap();
    handle.present_card(CARD_B.to_vec()).await.unwrap();
    let summary = agent.run().await.unwrap();

    assert_eq!(summary.scans, 1);
    assert_eq!(service.call_count(), 1);
    assert!(sink.contains("CHECK IN: Alice"));
    assert_eq!(handle.release_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_device_unavailable_at_startup_is_fatal() {
    let (reader, handle) = MockReader::with_name("ACR122U");
    handle.set_unavailable(true);
    let service = FakeService::new();
    let sink = MemorySink::new();
    let (_trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), sink.clone(), config(), signal);

    let err = agent.run().await.unwrap_err();

    assert!(matches!(err, AgentError::DeviceUnavailable(_)));
    assert_eq!(err.device(), Some("ACR122U"));
    assert_eq!(agent.phase(), AgentPhase::Terminating);
    assert_eq!(handle.open_count(), 0);
    assert_eq!(handle.release_count(), 0);
    assert_eq!(service.call_count(), 0);
    assert!(sink.texts()[0].starts_with("Error connecting to card reader"));

    assert!(matches!(agent.run().await, Err(AgentError::State(_))));
}

/// A reader failure is waited out and the reader re-opened
#[tokio::test(start_paused = true)]
async fn test_device_failure_reopens_reader() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::new();
    let sink = MemorySink::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), sink.clone(), config(), signal);
    let started = tokio::time::Instant::now();

    let (result, ()) = tokio::join!(agent.run(), async {
        handle.inject_failure("antenna timeout").await.unwrap();
        handle.present_card(CARD_A.to_vec()).await.unwrap();
        wait_for_calls(&service, 1).await;
        trigger.shutdown();
    });

    let summary = result.unwrap();
    assert_eq!(summary.device_failures, 1);
    assert_eq!(summary.scans, 1);
    assert!(service.calls()[0].at - started >= Duration::from_secs(1));
    assert!(sink.contains("Reader error: Communication error: antenna timeout"));
    assert_eq!(handle.open_count(), 2);
    assert_eq!(handle.release_count(), 2);
}

/// A failed re-open counts as another reader failure and is retried
#[tokio::test(start_paused = true)]
async fn test_failed_reopen_is_retried() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), MemorySink::new(), config(), signal);

    let (result, ()) = tokio::join!(agent.run(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.set_unavailable(true);
        handle.inject_failure("unplugged").await.unwrap();
        handle.present_card(CARD_A.to_vec()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.set_unavailable(false);
        wait_for_calls(&service, 1).await;
        trigger.shutdown();
    });

    let summary = result.unwrap();
    assert_eq!(summary.device_failures, 2);
    assert_eq!(summary.scans, 1);
    assert_eq!(handle.open_count(), 2);
    assert_eq!(handle.release_count(), 2);
}

/// An interrupt while the reader is still opening ends the run cleanly
#[tokio::test(start_paused = true)]
async fn test_interrupt_while_opening_reader() {
    let (reader, handle) = MockReader::new();
    handle.set_open_blocks(true);
    let service = FakeService::new();
    let sink = MemorySink::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), sink.clone(), config(), signal);

    let (result, ()) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(30), agent.run()),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(handle.open_attempts(), 1);
            trigger.shutdown();
        }
    );

    let summary = result.expect("run ignored the interrupt").unwrap();
    assert_eq!(summary.scans, 0);
    assert_eq!(agent.phase(), AgentPhase::Terminating);
    assert_eq!(handle.open_count(), 0);
    assert_eq!(handle.release_count(), 0);
    assert_eq!(service.call_count(), 0);
    assert!(sink.contains("Shutting down card reader..."));
    assert!(!sink.contains("Card reader closed"));
}

/// An interrupt while re-opening after a reader failure ends the run cleanly
#[tokio::test(start_paused = true)]
async fn test_interrupt_while_reopening_reader() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), MemorySink::new(), config(), signal);

    let (result, ()) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(30), agent.run()),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.set_open_blocks(true);
            handle.inject_failure("writer went away").await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            assert_eq!(handle.open_attempts(), 2);
            trigger.shutdown();
        }
    );

    let summary = result.expect("run ignored the interrupt").unwrap();
    assert_eq!(summary.device_failures, 1);
    assert_eq!(summary.scans, 0);
    assert_eq!(agent.phase(), AgentPhase::Terminating);
    assert_eq!(handle.open_count(), 1);
    assert_eq!(handle.release_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_phase_history_of_one_scan() {
    let (reader, handle) = MockReader::new();
    let service = FakeService::new();
    let (trigger, signal) = shutdown_channel();
    let mut agent = Agent::new(reader, service.clone(), MemorySink::new(), config(), signal);

    let (result, ()) = tokio::join!(agent.run(), async {
        handle.present_card(CARD_A.to_vec()).await.unwrap();
        wait_for_calls(&service, 1).await;
        trigger.shutdown();
    });
    result.unwrap();

    let phases: Vec<AgentPhase> = agent
        .state_machine()
        .history()
        .iter()
        .map(|t| t.to)
        .collect();
    assert_eq!(
        phases,
        vec![
            AgentPhase::AwaitingCard,
            AgentPhase::Submitting,
            AgentPhase::Feedback,
            AgentPhase::Terminating,
        ]
    );
}

fn run_cards(cards: &[Vec<u8>]) -> (Vec<String>, bool, u64) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async {
        let (reader, handle) = MockReader::new();
        let service = FakeService::new();
        service.set_latency(Duration::from_millis(200));
        let (trigger, signal) = shutdown_channel();
        let mut agent = Agent::new(reader, service.clone(), MemorySink::new(), config(), signal);

        let (result, ()) = tokio::join!(agent.run(), async {
            for card in cards {
                handle.present_card(card.clone()).await.unwrap();
            }
            wait_for_calls(&service, cards.len()).await;
            trigger.shutdown();
        });

        let ids = service.calls().into_iter().map(|c| c.card_id).collect();
        (ids, service.overlapped(), result.unwrap().submissions)
    })
}

#[test]
fn test_cards_are_submitted_in_order() {
    let cards = vec![CARD_A.to_vec(), CARD_B.to_vec(), vec![1, 2, 3, 4]];
    let (ids, overlapped, submissions) = run_cards(&cards);

    assert_eq!(ids, vec!["04a22b9c", "045a2b92c16f80", "01020304"]);
    assert!(!overlapped);
    assert_eq!(submissions, 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_n_cards_give_n_ordered_submissions(
        cards in prop::collection::vec(prop::collection::vec(any::<u8>(), 4..=10), 1..8)
    ) {
        let (ids, overlapped, submissions) = run_cards(&cards);
        let expected: Vec<String> = cards.iter().map(hex::encode).collect();

        prop_assert_eq!(ids, expected);
        prop_assert!(!overlapped);
        prop_assert_eq!(submissions, cards.len() as u64);
    }
}
