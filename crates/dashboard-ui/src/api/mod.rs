pub mod routes;

use crate::state::DashboardState;
use crate::websocket;
use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the dashboard API router
pub fn router(state: DashboardState) -> Router {
    let max_upload_bytes = state.config.max_upload_mb * 1024 * 1024;
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/readyz", get(routes::readyz))
        .route("/metrics", get(routes::metrics))
        .route("/v1/status", get(routes::status))
        .route("/v1/config", get(routes::config))
        .route("/v1/analyze", post(routes::analyze))
        .route("/ws", get(websocket::ws_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
