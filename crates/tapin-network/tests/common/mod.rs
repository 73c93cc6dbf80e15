//! Canned check-in service for client integration tests.
//!
//! An axum router on an ephemeral loopback port answers every request with a
//! fixed status and body. The first request is handed back to the test
//! through a oneshot channel.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// One request as the server saw it.
#[derive(Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone)]
struct Canned {
    /// `None` never answers.
    status: Option<StatusCode>,
    body: String,
    delay: Duration,
    capture: Arc<Mutex<Option<oneshot::Sender<CapturedRequest>>>>,
}

async fn answer(
    State(canned): State<Canned>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request = CapturedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect(),
        body,
    };
    if let Some(tx) = canned.capture.lock().unwrap().take() {
        let _ = tx.send(request);
    }

    let Some(status) = canned.status else {
        return std::future::pending().await;
    };
    if !canned.delay.is_zero() {
        tokio::time::sleep(canned.delay).await;
    }

    (status, [(header::CONTENT_TYPE, "application/json")], canned.body).into_response()
}

async fn serve(canned: Canned) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(answer).with_state(canned);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Start a server that answers with `status` and `body`.
pub async fn respond_once(
    status: u16,
    body: &str,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    respond_once_after(status, body, Duration::ZERO).await
}

/// Same as [`respond_once`], but waits `delay` before answering.
pub async fn respond_once_after(
    status: u16,
    body: &str,
    delay: Duration,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let (tx, rx) = oneshot::channel();
    let addr = serve(Canned {
        status: Some(StatusCode::from_u16(status).unwrap()),
        body: body.to_string(),
        delay,
        capture: Arc::new(Mutex::new(Some(tx))),
    })
    .await;

    (endpoint(addr), rx)
}

/// Start a server that reads the request but never answers.
pub async fn never_respond() -> String {
    let addr = serve(Canned {
        status: None,
        body: String::new(),
        delay: Duration::ZERO,
        capture: Arc::new(Mutex::new(None)),
    })
    .await;

    endpoint(addr)
}

/// An endpoint nobody listens on.
pub async fn refused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    endpoint(addr)
}

fn endpoint(addr: SocketAddr) -> String {
    format!("http://{addr}/api/checkin")
}
