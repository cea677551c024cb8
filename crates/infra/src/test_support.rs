//! Test doubles shared by the dispatch and worker tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use axum::routing::post;

/// One request as seen by the stub.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

impl ReceivedRequest {
    pub fn uuid(&self) -> Option<&str> {
        self.body.get("uuid").and_then(|v| v.as_str())
    }
}

#[derive(Clone)]
struct StubState {
    statuses: Arc<HashMap<String, u16>>,
    default_status: u16,
    delay: Duration,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

/// Downstream callback endpoint on an ephemeral port.
///
/// Answers each POST with the status configured for the body's `uuid`, or the
/// default status.
pub struct StubEndpoint {
    pub url: reqwest::Url,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl StubEndpoint {
    pub async fn spawn(default_status: u16) -> Self {
        Self::spawn_with(HashMap::new(), default_status, Duration::ZERO).await
    }

    pub async fn spawn_with(
        statuses: HashMap<String, u16>,
        default_status: u16,
        delay: Duration,
    ) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            statuses: Arc::new(statuses),
            default_status,
            delay,
            received: received.clone(),
        };

        let app = Router::new()
            .route("/callbacks/job-status", post(receive))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let url = format!("http://{addr}/callbacks/job-status").parse().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url,
            received,
            handle,
        }
    }

    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }

    pub fn count_for(&self, uuid: &str) -> usize {
        self.received()
            .iter()
            .filter(|r| r.uuid() == Some(uuid))
            .count()
    }
}

impl Drop for StubEndpoint {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn receive(State(state): State<StubState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request = ReceivedRequest { content_type, body };
    let status = request
        .uuid()
        .and_then(|uuid| state.statuses.get(uuid).copied())
        .unwrap_or(state.default_status);
    state.received.lock().unwrap().push(request);

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    StatusCode::from_u16(status).unwrap()
}

/// An address nothing listens on (bound, then released).
pub async fn refused_url() -> reqwest::Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/callbacks/job-status").parse().unwrap()
}
