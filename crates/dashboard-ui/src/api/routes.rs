use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::path::Path;
use telemetry::metrics::DASHBOARD_ANALYSIS_RUNS;
use tracing::{error, info};

use crate::analysis;
use crate::state::DashboardState;

/// Health check endpoint
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "dashboard-ui"
        })),
    )
}

/// Readiness check endpoint
pub async fn readyz(State(state): State<DashboardState>) -> impl IntoResponse {
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

/// Current live-view snapshot
pub async fn status(State(state): State<DashboardState>) -> impl IntoResponse {
    let live = state.live_snapshot().await;
    (
        StatusCode::OK,
        Json(json!({
            "live_source": state.config.live_source,
            "live": live,
        })),
    )
}

/// Effective dashboard configuration, as served to clients
pub async fn config(State(state): State<DashboardState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "thresholds": state.config.thresholds,
            "live_source": state.config.live_source,
            "status_update_interval": state.config.status_update_interval,
            "analysis_sample_fps": state.config.analysis_sample_fps,
            "max_upload_mb": state.config.max_upload_mb,
            "detector_backend": state.config.detector.backend,
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

/// Accept a video upload and return its analysis report
pub async fn analyze(
    State(state): State<DashboardState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let upload = match read_upload(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return error_response(StatusCode::BAD_REQUEST, "no video file in upload"),
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid multipart payload: {}", e),
            )
        }
    };

    let (file_name, data) = upload;
    if !analysis::extension_allowed(&file_name) {
        return error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported file type, expected .mp4 or .avi",
        );
    }
    if data.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty upload");
    }

    let temp_dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            error!(error = %e, "failed to create analysis scratch dir");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to stage upload");
        }
    };
    // Keep the extension so ffmpeg picks the right demuxer.
    let ext = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let video_path = temp_dir.path().join(format!("upload.{}", ext.to_lowercase()));
    if let Err(e) = tokio::fs::write(&video_path, &data).await {
        error!(error = %e, "failed to stage upload");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to stage upload");
    }

    info!(file = %file_name, bytes = data.len(), "starting upload analysis");

    match analysis::analyze_file(&state, &video_path).await {
        Ok(report) => {
            DASHBOARD_ANALYSIS_RUNS
                .with_label_values(&["success"])
                .inc();
            info!(
                file = %file_name,
                frames = report.frames_analyzed,
                peak = report.peak_person_count,
                alerts = report.alerts.len(),
                "upload analysis finished"
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => {
            DASHBOARD_ANALYSIS_RUNS
                .with_label_values(&["failure"])
                .inc();
            error!(file = %file_name, error = %e, "upload analysis failed");
            error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                &format!("analysis failed: {}", e),
            )
        }
    }
}

/// Pull the first file field out of the multipart body.
async fn read_upload(
    multipart: &mut Multipart,
) -> Result<Option<(String, Bytes)>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        let name = match field.file_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let data = field.bytes().await?;
        return Ok(Some((name, data)));
    }
    Ok(None)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
