use analytics::FrameAnalyzer;
use anyhow::Result;
use monitor_node::{api, capture, config::Config, publisher::FramePublisher, state::MonitorState};
use telemetry::{init_structured_logging, LogConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::new("monitor-node").with_version(env!("CARGO_PKG_VERSION"));
    init_structured_logging(log_config);

    let config = Config::from_env()?;
    info!(
        source = %config.video_source,
        source_id = %config.source_id,
        warning_threshold = config.thresholds.warning_threshold,
        critical_threshold = config.thresholds.critical_threshold,
        persistence_window = config.thresholds.persistence_window,
        "starting monitor node"
    );

    let detector = detector::create_detector(&config.detector)?;
    info!(detector = detector.name(), "detector ready");

    let state = MonitorState::new(config.clone(), detector.clone());
    let cancel = CancellationToken::new();

    let analyzer = FrameAnalyzer::new(
        config.source_id.as_str(),
        detector,
        config.thresholds.clone(),
    )
    .with_jpeg_quality(config.jpeg_quality);
    let publisher = FramePublisher::connect(&config);
    let capture_task = capture::start_capture(state.clone(), analyzer, publisher, cancel.clone());

    let app = api::router(state);
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "monitor node listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    capture_task.await.ok();
    info!("monitor node stopped");

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
    cancel.cancel();
}
