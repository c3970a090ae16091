use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::state::AppState;

/// How long `/health` waits for the metrics lock before degrading
const HEALTH_LOCK_WAIT: Duration = Duration::from_millis(50);

/// Engine readiness report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    /// "ready" once the engine is constructed, "initializing" before
    pub status: String,
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_s: Option<u64>,
}

/// Health check handler
///
/// Never triggers engine construction and never blocks on the metrics lock.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let engine = state.engine.engine_name().to_string();

    let Some(snapshot) = state.metrics.try_snapshot(HEALTH_LOCK_WAIT) else {
        debug!("Metrics busy, reporting degraded health");
        return Json(HealthResponse {
            status: "initializing".to_string(),
            engine,
            warmed: None,
            uptime_s: None,
        });
    };

    let status = if state.engine.is_ready() {
        "ready"
    } else {
        "initializing"
    };

    Json(HealthResponse {
        status: status.to_string(),
        engine,
        warmed: Some(snapshot.warmed),
        uptime_s: Some(state.metrics.uptime().as_secs()),
    })
}

/// Plain-text metrics exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
        .into_response()
}
