use axum::{Extension, Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use propagator_infra::workers::{StatsHandle, WorkerStats};

/// Effective propagation settings, as reported by `/debug/vars`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigVars {
    pub retries: u32,
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    pub callbacks_uri: String,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsState {
    pub service: &'static str,
    pub version: &'static str,
    pub config: ConfigVars,
    pub stats: StatsHandle,
}

#[derive(Debug, Serialize)]
struct Vars {
    service: &'static str,
    version: &'static str,
    config: ConfigVars,
    worker: WorkerStats,
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn debug_vars(Extension(state): Extension<DiagnosticsState>) -> impl IntoResponse {
    Json(Vars {
        service: state.service,
        version: state.version,
        config: state.config.clone(),
        worker: state.stats.snapshot(),
    })
}
