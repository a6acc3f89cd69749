use anyhow::Result;
use dashboard_ui::{api, config::Config, live, state::DashboardState};
use telemetry::{init_structured_logging, LogConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::new("dashboard-ui").with_version(env!("CARGO_PKG_VERSION"));
    init_structured_logging(log_config);

    let config = Config::from_env()?;
    info!(
        warning_threshold = config.thresholds.warning_threshold,
        critical_threshold = config.thresholds.critical_threshold,
        persistence_window = config.thresholds.persistence_window,
        frontend = %config.frontend_dir.display(),
        "starting dashboard"
    );

    let detector = detector::create_detector(&config.detector)?;
    info!(detector = detector.name(), "detector ready");

    let state = DashboardState::new(config.clone(), detector);
    let cancel = CancellationToken::new();

    if config.live_source.is_none() {
        info!("no live source configured, serving file analysis only");
    }
    let live_task = live::start_live_capture(state.clone(), cancel.clone());

    let frontend = ServeDir::new(&config.frontend_dir).append_index_html_on_directories(true);
    let app = api::router(state).fallback_service(frontend);
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "dashboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    live_task.await.ok();
    info!("dashboard stopped");

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
