//! Integration tests for CheckinClient
//!
//! These tests run the client against a throwaway HTTP server on the
//! loopback interface and verify the wire request and the classification
//! of real responses, refusals and stalls.

mod common;

use std::time::Duration;

use chrono::DateTime;
use tapin_core::{CardId, CheckResult, ScanEvent, TransportFailureKind};
use tapin_network::{CheckinClient, CheckinClientConfig, CheckinService, HealthStatus};

fn client_for(endpoint: &str, timeout: Duration) -> CheckinClient {
    CheckinClient::new(CheckinClientConfig {
        endpoint_url: endpoint.to_string(),
        timeout,
        proxy_from_env: false,
    })
    .unwrap()
}

fn event() -> ScanEvent {
    let card = CardId::new(vec![0x04, 0xA2, 0x2B, 0x9C]).unwrap();
    let at = DateTime::parse_from_rfc3339("2024-03-01T08:30:00.123+01:00").unwrap();
    ScanEvent::new(&card, at)
}

/// Scenario A: a check-in answer names the user
#[tokio::test]
async fn test_checkin_response() {
    let (endpoint, _request) = common::respond_once(200, r#"{"action":"checkin","user":"Alice"}"#).await;
    let client = client_for(&endpoint, Duration::from_secs(2));

    let result = client.submit(&event()).await;

    assert_eq!(
        result,
        CheckResult::CheckedIn {
            user: "Alice".to_string()
        }
    );
}

/// Scenario B: a check-out answer carries the duration
#[tokio::test]
async fn test_checkout_response() {
    let (endpoint, _request) =
        common::respond_once(200, r#"{"action":"checkout","user":"Bob","duration":"2h15m"}"#).await;
    let client = client_for(&endpoint, Duration::from_secs(2));

    let result = client.submit(&event()).await;

    assert_eq!(
        result,
        CheckResult::CheckedOut {
            user: "Bob".to_string(),
            duration: Some("2h15m".to_string())
        }
    );
}

/// Scenario C: 404 means the card is not registered, whatever the body
#[tokio::test]
async fn test_unknown_card_response() {
    let (endpoint, _request) = common::respond_once(404, r#"{"error":"Card not registered"}"#).await;
    let client = client_for(&endpoint, Duration::from_secs(2));

    assert_eq!(client.submit(&event()).await, CheckResult::UnknownCard);
}

/// Scenario F: an unexpected status keeps the body verbatim
#[tokio::test]
async fn test_service_error_response() {
    let (endpoint, _request) = common::respond_once(500, "internal error").await;
    let client = client_for(&endpoint, Duration::from_secs(2));

    assert_eq!(
        client.submit(&event()).await,
        CheckResult::ServiceError {
            status_code: 500,
            body: "internal error".to_string()
        }
    );
}

/// Scenario D: nobody listening is a connection failure
#[tokio::test]
async fn test_connection_refused() {
    let endpoint = common::refused_endpoint().await;
    let client = client_for(&endpoint, Duration::from_secs(2));

    let result = client.submit(&event()).await;

    match result {
        CheckResult::TransportFailure { kind, detail } => {
            assert_eq!(kind, TransportFailureKind::Connection);
            assert!(!detail.is_empty());
        }
        other => panic!("expected connection failure, got {other:?}"),
    }
}

/// A server that accepts but never answers is a timeout
#[tokio::test]
async fn test_stalled_server_times_out() {
    let endpoint = common::never_respond().await;
    let client = client_for(&endpoint, Duration::from_millis(200));

    let started = std::time::Instant::now();
    let result = client.submit(&event()).await;

    assert!(matches!(
        result,
        CheckResult::TransportFailure {
            kind: TransportFailureKind::Timeout,
            ..
        }
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// An answer that arrives after the deadline is still a timeout
#[tokio::test]
async fn test_late_response_times_out() {
    let (endpoint, _request) = common::respond_once_after(
        200,
        r#"{"action":"checkin","user":"Alice"}"#,
        Duration::from_millis(600),
    )
    .await;
    let client = client_for(&endpoint, Duration::from_millis(150));

    assert!(matches!(
        client.submit(&event()).await,
        CheckResult::TransportFailure {
            kind: TransportFailureKind::Timeout,
            ..
        }
    ));
}

/// The wire request is one JSON POST to the endpoint path
#[tokio::test]
async fn test_request_shape() {
    let (endpoint, request) = common::respond_once(200, r#"{"action":"checkin","user":"Alice"}"#).await;
    let client = client_for(&endpoint, Duration::from_secs(2));

    client.submit(&event()).await;
    let request = request.await.unwrap();

    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/checkin");
    assert!(
        request
            .header("content-type")
            .is_some_and(|v| v.starts_with("application/json"))
    );

    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["card_id"], "04a22b9c");
    assert_eq!(body["timestamp"], "2024-03-01T08:30:00.123+01:00");
    assert_eq!(body.as_object().unwrap().len(), 2);
}

/// The trait seam behaves exactly like the inherent method
#[tokio::test]
async fn test_service_trait_dispatch() {
    async fn via_trait<S: CheckinService>(service: &S, event: &ScanEvent) -> CheckResult {
        service.submit(event).await
    }

    let (endpoint, _request) = common::respond_once(404, "").await;
    let client = client_for(&endpoint, Duration::from_secs(2));

    assert_eq!(via_trait(&client, &event()).await, CheckResult::UnknownCard);
}

#[tokio::test]
async fn test_probe_health_ok() {
    let (url, request) = common::respond_once(200, r#"{"status":"ok"}"#).await;
    let client = client_for(&url, Duration::from_secs(2));

    assert_eq!(client.probe_health(&url).await, HealthStatus::Healthy);
    assert_eq!(request.await.unwrap().method, "GET");
}

#[tokio::test]
async fn test_probe_health_unhealthy() {
    let (url, _request) = common::respond_once(503, "").await;
    let client = client_for(&url, Duration::from_secs(2));

    assert_eq!(
        client.probe_health(&url).await,
        HealthStatus::Unhealthy { status_code: 503 }
    );
}

#[tokio::test]
async fn test_probe_health_unreachable() {
    let url = common::refused_endpoint().await;
    let client = client_for(&url, Duration::from_secs(2));

    assert!(matches!(
        client.probe_health(&url).await,
        HealthStatus::Unreachable {
            kind: TransportFailureKind::Connection,
            ..
        }
    ));
}
