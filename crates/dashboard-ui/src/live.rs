//! Supervised capture loop for the live view: read frames from the
//! configured source, analyze them, fan the overlaid result out to
//! WebSocket clients, restart the source with backoff when it dies.

use analytics::{FrameAnalyzer, RiskStatus};
use common::frames::VideoFrame;
use common::mjpeg::{MjpegOptions, MjpegStream, SourceKind};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::state::DashboardState;

/// Logical source name for the dashboard's own capture.
pub const LIVE_SOURCE_ID: &str = "live";

const RESTART_BACKOFF_START: Duration = Duration::from_secs(1);
const RESTART_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// One analyzed live frame fanned out to WebSocket clients.
#[derive(Debug, Clone)]
pub struct LiveUpdate {
    pub sequence: u64,
    pub person_count: usize,
    pub status: RiskStatus,
    /// Overlaid JPEG bytes
    pub frame_jpeg: Vec<u8>,
}

enum SessionEnd {
    Cancelled,
    Eof,
    Failed(anyhow::Error),
}

/// Spawn the supervised live capture loop. Returns immediately if no
/// live source is configured.
pub fn start_live_capture(state: DashboardState, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let source = match &state.config.live_source {
            Some(source) => source.clone(),
            None => return,
        };
        let source_kind = SourceKind::classify(&source);
        let mut analyzer = FrameAnalyzer::new(
            LIVE_SOURCE_ID,
            state.detector.clone(),
            state.config.thresholds.clone(),
        );
        let mut backoff = RESTART_BACKOFF_START;

        info!(source = %source, "starting live capture");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let (end, frames) = run_session(&state, &source, &mut analyzer, &cancel).await;
            match end {
                SessionEnd::Cancelled => break,
                SessionEnd::Eof => {
                    if source_kind == SourceKind::File {
                        info!(source = %source, frames, "live source played to the end");
                        break;
                    }
                    warn!(source = %source, frames, "live source ended");
                }
                SessionEnd::Failed(e) => {
                    error!(source = %source, frames, error = %e, "live capture session failed");
                }
            }

            if frames > 0 {
                backoff = RESTART_BACKOFF_START;
            }

            analyzer.reset();
            state.set_live_running(false).await;

            warn!(
                source = %source,
                delay_ms = backoff.as_millis() as u64,
                "restarting live source"
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(RESTART_BACKOFF_MAX);
        }

        state.set_live_running(false).await;
        info!(source = %source, "live capture stopped");
    })
}

/// One capture session against a freshly opened source. The source
/// paces delivery itself, so the loop reads as fast as frames arrive.
async fn run_session(
    state: &DashboardState,
    source: &str,
    analyzer: &mut FrameAnalyzer,
    cancel: &CancellationToken,
) -> (SessionEnd, u64) {
    let options = MjpegOptions::default();

    let opened = {
        let source = source.to_string();
        let options = options.clone();
        tokio::task::spawn_blocking(move || MjpegStream::open(&source, &options)).await
    };
    let mut stream = match opened {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return (SessionEnd::Failed(e), 0),
        Err(e) => return (SessionEnd::Failed(e.into()), 0),
    };

    let mut frames: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return (SessionEnd::Cancelled, frames);
        }

        // A read that blocks delays cancellation by at most one frame.
        let read = tokio::task::spawn_blocking(move || {
            let mut stream = stream;
            let result = stream.next_frame();
            (stream, result)
        })
        .await;
        let result = match read {
            Ok((returned, result)) => {
                stream = returned;
                result
            }
            Err(e) => return (SessionEnd::Failed(e.into()), frames),
        };

        match result {
            Ok(Some(jpeg)) => {
                frames += 1;
                let frame =
                    VideoFrame::jpeg(LIVE_SOURCE_ID, frames, options.width, options.height, jpeg);
                match analyzer.analyze(&frame).await {
                    Ok(report) => {
                        state.apply_live_report(&report, analyzer.streak()).await;
                        // Send fails only when no client is subscribed.
                        let _ = state.updates.send(LiveUpdate {
                            sequence: report.sequence,
                            person_count: report.person_count,
                            status: report.status,
                            frame_jpeg: report.frame,
                        });
                    }
                    Err(e) => {
                        warn!(
                            sequence = frames,
                            error = %e,
                            "live frame analysis failed, skipping"
                        );
                    }
                }
            }
            Ok(None) => return (SessionEnd::Eof, frames),
            Err(e) => return (SessionEnd::Failed(e), frames),
        }
    }
}
