use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use propagator_core::{ExternalId, RetryCeiling, StatusRecord};
use propagator_infra::config::{PropagatorConfig, ResolvedConfig};
use propagator_infra::status_query::{InMemoryStatusStore, QueryError, StatusQuery};
use propagator_service::app;
use reqwest::StatusCode as ReqwestStatus;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Downstream callbacks endpoint recording every uuid it receives.
struct Downstream {
    url: String,
    received: Arc<Mutex<Vec<String>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl Downstream {
    async fn spawn() -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/callbacks/job-status", post(receive))
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let url = format!("http://{}/callbacks/job-status", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url,
            received,
            handle,
        }
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for Downstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn receive(
    State(received): State<Arc<Mutex<Vec<String>>>>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    if let Some(uuid) = body["uuid"].as_str() {
        received.lock().unwrap().push(uuid.to_string());
    }
    StatusCode::OK
}

/// Stands in for a database whose schema is missing.
struct FailingQuery;

#[async_trait::async_trait]
impl StatusQuery for FailingQuery {
    async fn unpropagated(
        &self,
        _ceiling: RetryCeiling,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ExternalId>, QueryError> {
        Err(QueryError::Query("relation \"job_status_updates\" does not exist".into()))
    }
}

fn config(callbacks_uri: &str) -> ResolvedConfig {
    let yaml = format!(
        r#"
db:
  uri: postgres://unused/jobs
apps:
  callbacks_uri: {callbacks_uri}
propagation:
  batch_size: 2
  poll_interval_ms: 20
diagnostics:
  listen_addr: 127.0.0.1:0
logging:
  format: pretty
"#
    );
    PropagatorConfig::from_yaml_str(&yaml)
        .unwrap()
        .validate()
        .unwrap()
}

fn store(ids: &[&str]) -> Arc<InMemoryStatusStore> {
    Arc::new(InMemoryStatusStore::with_records(
        ids.iter().map(|id| StatusRecord::pending(ExternalId::new(*id).unwrap())),
    ))
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..300 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{what} did not happen within timeout");
}

#[tokio::test]
async fn propagates_and_reports_through_diagnostics() {
    let downstream = Downstream::spawn().await;
    let store = store(&["job-a", "job-b", "job-c"]);

    let service = app::start(
        store.clone(),
        &config(&downstream.url),
        reqwest::Client::new(),
        Span::none(),
    )
    .await
    .unwrap();
    let base_url = format!("http://{}", service.diagnostics_addr());

    eventually("all candidates delivered", || {
        let received = downstream.received();
        ["job-a", "job-b", "job-c"]
            .iter()
            .all(|id| received.iter().any(|r| r == id))
    })
    .await;

    let client = reqwest::Client::new();
    let res = client.get(format!("{}/health", base_url)).send().await.unwrap();
    assert_eq!(res.status(), ReqwestStatus::OK);

    let res = client.get(format!("{}/debug/vars", base_url)).send().await.unwrap();
    assert_eq!(res.status(), ReqwestStatus::OK);
    let vars: serde_json::Value = res.json().await.unwrap();
    assert_eq!(vars["service"], "job-status-propagator");
    assert_eq!(vars["config"]["retries"], 3);
    assert_eq!(vars["config"]["batch_size"], 2);
    assert!(vars["worker"]["cycles"].as_u64().unwrap() >= 1);
    assert!(vars["worker"]["delivered"].as_u64().unwrap() >= 3);

    // acknowledged records stop being sent
    for id in ["job-a", "job-b", "job-c"] {
        store.mark_propagated(&ExternalId::new(id).unwrap());
    }
    let settled = downstream.received().len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(downstream.received().len() <= settled + 3);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn failing_query_stops_the_service_with_an_error() {
    let downstream = Downstream::spawn().await;
    let service = app::start(
        FailingQuery,
        &config(&downstream.url),
        reqwest::Client::new(),
        Span::none(),
    )
    .await
    .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        service.run_until(std::future::pending()),
    )
    .await
    .expect("service did not stop");

    assert!(result.is_err());
    assert!(downstream.received().is_empty());
}

#[tokio::test]
async fn occupied_diagnostics_port_fails_startup() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = config("http://127.0.0.1:9/callbacks/job-status");
    config.diagnostics_addr = taken.local_addr().unwrap();

    let result = app::start(store(&[]), &config, reqwest::Client::new(), Span::none()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn shutdown_signal_stops_a_healthy_service() {
    let downstream = Downstream::spawn().await;
    let service = app::start(
        store(&[]),
        &config(&downstream.url),
        reqwest::Client::new(),
        Span::none(),
    )
    .await
    .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        service.run_until(tokio::time::sleep(Duration::from_millis(100))),
    )
    .await
    .expect("service did not stop");

    assert!(result.is_ok());
}
