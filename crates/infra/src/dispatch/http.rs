//! HTTP dispatcher: POSTs `{"uuid": ...}` to the downstream callback endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use propagator_core::{ExternalId, NotificationPayload};

use super::{Delivered, DispatchError, Dispatcher, classify_status};

/// Build the shared, connection-pooling client.
///
/// Construct it once per process and hand clones to every dispatcher; clones
/// share the same pool. `request_timeout` is unset by default, so a stalled
/// downstream holds its batch until the transport gives up.
pub fn build_http_client(request_timeout: Option<Duration>) -> Result<Client, DispatchError> {
    let mut builder = Client::builder();
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| DispatchError::Transport(format!("failed to build http client: {e}")))
}

/// Delivers notifications over HTTP with an injected client.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
    endpoint: Url,
}

impl HttpDispatcher {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, body: Vec<u8>) -> Result<u16, DispatchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        // The body is not interpreted; dropping the response releases the connection.
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(
        &self,
        id: &ExternalId,
        cancel: &CancellationToken,
    ) -> Result<Delivered, DispatchError> {
        info!(external_id = %id, endpoint = %self.endpoint, "sending job status");

        let body = NotificationPayload::new(id.clone())
            .to_json()
            .map_err(|e| DispatchError::Serialization(e.to_string()));
        let body = match body {
            Ok(body) => body,
            Err(err) => {
                error!(external_id = %id, error = %err, "failed to encode job status");
                return Err(err);
            }
        };

        info!(
            external_id = %id,
            payload = %String::from_utf8_lossy(&body),
            "message to propagate"
        );

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DispatchError::Cancelled),
            sent = self.send(body) => sent,
        };

        let outcome = sent.and_then(classify_status);
        match &outcome {
            Ok(delivered) => {
                info!(external_id = %id, status = delivered.status, "job status delivered");
            }
            Err(DispatchError::Delivery { status }) => {
                warn!(
                    external_id = %id,
                    status = *status,
                    endpoint = %self.endpoint,
                    "delivery rejected"
                );
            }
            Err(DispatchError::Cancelled) => {
                debug!(external_id = %id, "delivery cancelled");
            }
            Err(err) => {
                error!(
                    external_id = %id,
                    endpoint = %self.endpoint,
                    error = %err,
                    "delivery failed"
                );
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    use tracing_test::traced_test;

    use super::*;
    use crate::test_support::{StubEndpoint, refused_url};

    fn id(s: &str) -> ExternalId {
        ExternalId::new(s).unwrap()
    }

    fn dispatcher(url: Url) -> HttpDispatcher {
        HttpDispatcher::new(build_http_client(None).unwrap(), url)
    }

    #[tokio::test]
    async fn posts_json_payload_with_content_type() {
        let stub = StubEndpoint::spawn(200).await;
        let d = dispatcher(stub.url.clone());

        let delivered = d.dispatch(&id("job-a"), &CancellationToken::new()).await.unwrap();
        assert_eq!(delivered.status, 200);

        let received = stub.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(received[0].body, serde_json::json!({ "uuid": "job-a" }));
    }

    #[tokio::test]
    async fn classifies_real_responses_at_the_boundaries() {
        let statuses = HashMap::from([
            ("ok-200".to_string(), 200),
            ("ok-299".to_string(), 299),
            ("fail-300".to_string(), 300),
            ("fail-500".to_string(), 500),
        ]);
        let stub = StubEndpoint::spawn_with(statuses, 200, Duration::ZERO).await;
        let d = dispatcher(stub.url.clone());
        let cancel = CancellationToken::new();

        assert_eq!(d.dispatch(&id("ok-200"), &cancel).await, Ok(Delivered { status: 200 }));
        assert_eq!(d.dispatch(&id("ok-299"), &cancel).await, Ok(Delivered { status: 299 }));
        assert_eq!(
            d.dispatch(&id("fail-300"), &cancel).await,
            Err(DispatchError::Delivery { status: 300 })
        );
        assert_eq!(
            d.dispatch(&id("fail-500"), &cancel).await,
            Err(DispatchError::Delivery { status: 500 })
        );
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_error() {
        let d = dispatcher(refused_url().await);
        let err = d.dispatch(&id("job-a"), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Transport(_)));
    }

    #[tokio::test]
    async fn cancellation_aborts_a_stalled_request() {
        let stub = StubEndpoint::spawn_with(HashMap::new(), 200, Duration::from_secs(30)).await;
        let d = dispatcher(stub.url.clone());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = d.dispatch(&id("job-a"), &cancel).await.unwrap_err();
        assert_eq!(err, DispatchError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    #[traced_test]
    async fn logs_attempt_payload_and_outcome() {
        let stub = StubEndpoint::spawn(500).await;
        let d = dispatcher(stub.url.clone());

        let _ = d.dispatch(&id("job-a"), &CancellationToken::new()).await;

        assert!(logs_contain("sending job status"));
        assert!(logs_contain("message to propagate"));
        assert!(logs_contain(r#"{"uuid":"job-a"}"#));
        assert!(logs_contain("delivery rejected"));
        assert!(logs_contain("status=500"));
    }
}
