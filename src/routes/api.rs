use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, tts};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
///
/// CORS and security headers are layered on in main.rs.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/health", get(api::health_check))
        .route("/metrics", get(api::metrics))
        .route("/api/tts", post(tts::synthesize_speech))
        .layer(TraceLayer::new_for_http())
}
