use crate::state::MonitorState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Health check endpoint
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "monitor-node"
        })),
    )
}

/// Readiness check endpoint
pub async fn readyz(State(state): State<MonitorState>) -> impl IntoResponse {
    match state.detector.health_check().await {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "detector": state.detector.id()
            })),
        ),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "detector": state.detector.id()
            })),
        ),
    }
}

/// Current capture status snapshot
pub async fn status(State(state): State<MonitorState>) -> impl IntoResponse {
    let snapshot = state.snapshot().await;
    (
        StatusCode::OK,
        Json(json!({
            "source_id": state.config.source_id,
            "video_source": state.config.video_source,
            "thresholds": state.config.thresholds,
            "snapshot": snapshot,
        })),
    )
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics() -> impl IntoResponse {
    match telemetry::metrics::encode_metrics() {
        Ok(body) => body.into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}
