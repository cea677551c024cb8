//! Process wiring: diagnostics router plus the propagation worker.
//!
//! - `routes.rs`: `/health` and `/debug/vars` handlers
//! - this file: building the router, starting and stopping both halves

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{Extension, Router, routing::get};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Span, error, info};

use propagator_infra::config::ResolvedConfig;
use propagator_infra::dispatch::HttpDispatcher;
use propagator_infra::status_query::StatusQuery;
use propagator_infra::workers::{
    PropagationWorker, PropagationWorkerHandle, WorkerError, WorkerStats,
};

pub mod routes;

pub use routes::{ConfigVars, DiagnosticsState};

pub const SERVICE_NAME: &str = "job-status-propagator";

/// Build the diagnostics router (public entrypoint used by `start` and tests).
pub fn build_router(state: DiagnosticsState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/debug/vars", get(routes::debug_vars))
        .layer(Extension(state))
}

/// A running propagator: worker plus diagnostics listener.
pub struct Service {
    diagnostics_addr: SocketAddr,
    worker: PropagationWorkerHandle,
    diagnostics: JoinHandle<std::io::Result<()>>,
    shutdown: CancellationToken,
}

enum Exit {
    Worker(Result<(), WorkerError>),
    Signal,
}

/// Bind the diagnostics listener and spawn the propagation worker.
///
/// A bind failure is returned before any worker is started.
pub async fn start<Q>(
    query: Q,
    config: &ResolvedConfig,
    client: reqwest::Client,
    parent: Span,
) -> anyhow::Result<Service>
where
    Q: StatusQuery + 'static,
{
    let listener = tokio::net::TcpListener::bind(config.diagnostics_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind diagnostics listener on {}",
                config.diagnostics_addr
            )
        })?;
    let diagnostics_addr = listener.local_addr()?;

    let dispatcher = Arc::new(HttpDispatcher::new(client, config.callbacks_uri.clone()));
    let worker_config = config.worker_config().with_name(SERVICE_NAME);
    let worker =
        PropagationWorker::new(query, dispatcher, worker_config).with_parent_span(parent.clone());

    let state = DiagnosticsState {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        config: ConfigVars {
            retries: config.retry_ceiling.get(),
            batch_size: config.batch_size.get(),
            poll_interval_ms: config.poll_interval.as_millis() as u64,
            callbacks_uri: config.callbacks_uri.to_string(),
        },
        stats: worker.stats_handle(),
    };

    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let app = build_router(state);
    let diagnostics = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });
    info!(parent: &parent, addr = %diagnostics_addr, "diagnostics listening");

    let worker = worker.spawn(shutdown.child_token());

    Ok(Service {
        diagnostics_addr,
        worker,
        diagnostics,
        shutdown,
    })
}

impl Service {
    pub fn diagnostics_addr(&self) -> SocketAddr {
        self.diagnostics_addr
    }

    pub fn stats(&self) -> WorkerStats {
        self.worker.stats()
    }

    /// Run until `signal` resolves or the worker stops on its own.
    ///
    /// A worker that stops on its own (failed candidate query) is an error.
    pub async fn run_until<F>(mut self, signal: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let exit = tokio::select! {
            result = self.worker.join() => Exit::Worker(result),
            _ = signal => Exit::Signal,
        };

        match exit {
            Exit::Signal => {
                info!("shutdown requested");
                self.shutdown().await
            }
            Exit::Worker(result) => {
                self.shutdown.cancel();
                self.stop_diagnostics().await;
                match result {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        error!(error = %e, "propagation worker exited");
                        Err(e).context("propagation worker exited")
                    }
                }
            }
        }
    }

    /// Cancel in-flight work and wait for the worker and listener to stop.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        let Service {
            worker,
            diagnostics,
            ..
        } = self;

        let result = worker.shutdown().await;
        Self::join_diagnostics(diagnostics).await;
        result.context("propagation worker failed during shutdown")
    }

    async fn stop_diagnostics(self) {
        Self::join_diagnostics(self.diagnostics).await;
    }

    async fn join_diagnostics(handle: JoinHandle<std::io::Result<()>>) {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "diagnostics listener failed"),
            Err(e) => error!(error = %e, "diagnostics listener task failed"),
        }
    }
}
