pub mod routes;

use crate::state::MonitorState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Build the operations API router
pub fn router(state: MonitorState) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/readyz", get(routes::readyz))
        .route("/metrics", get(routes::metrics))
        .route("/v1/status", get(routes::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
