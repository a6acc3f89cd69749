//! Supervised capture loop: read frames, analyze, publish, pace to the
//! FPS limit, restart the source with backoff when it dies.

use analytics::FrameAnalyzer;
use common::frames::VideoFrame;
use common::mjpeg::{MjpegOptions, MjpegStream, SourceKind};
use std::time::Duration;
use telemetry::metrics::{
    MONITOR_ALERTS_EMITTED, MONITOR_FRAMES_PROCESSED, MONITOR_PERSONS_DETECTED,
    MONITOR_RISK_LEVEL, MONITOR_SOURCE_RESTARTS,
};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::publisher::FramePublisher;
use crate::state::MonitorState;

const RESTART_BACKOFF_START: Duration = Duration::from_secs(1);
const RESTART_BACKOFF_MAX: Duration = Duration::from_secs(30);
const DENSITY_LOG_INTERVAL: u64 = 100;

enum SessionEnd {
    Cancelled,
    Eof,
    Failed(anyhow::Error),
}

/// Spawn the supervised capture loop for the configured video source.
pub fn start_capture(
    state: MonitorState,
    mut analyzer: FrameAnalyzer,
    publisher: FramePublisher,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let source = state.config.video_source.clone();
        let source_kind = SourceKind::classify(&source);
        let mut backoff = RESTART_BACKOFF_START;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let (end, frames) = run_session(&state, &mut analyzer, &publisher, &cancel).await;
            match end {
                SessionEnd::Cancelled => break,
                SessionEnd::Eof => {
                    if source_kind == SourceKind::File {
                        info!(source = %source, frames, "video file ended");
                        break;
                    }
                    warn!(source = %source, frames, "video source ended");
                }
                SessionEnd::Failed(e) => {
                    error!(source = %source, frames, error = %e, "capture session failed");
                }
            }

            if frames > 0 {
                backoff = RESTART_BACKOFF_START;
            }

            MONITOR_SOURCE_RESTARTS
                .with_label_values(&[&state.config.source_id])
                .inc();
            analyzer.reset();

            warn!(
                source = %source,
                delay_ms = backoff.as_millis() as u64,
                "restarting video source"
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(RESTART_BACKOFF_MAX);
        }

        info!(source = %source, "capture loop stopped");
    })
}

/// One capture session against a freshly opened source. Returns how the
/// session ended and the number of frames it delivered.
async fn run_session(
    state: &MonitorState,
    analyzer: &mut FrameAnalyzer,
    publisher: &FramePublisher,
    cancel: &CancellationToken,
) -> (SessionEnd, u64) {
    let config = &state.config;
    let options = MjpegOptions {
        width: config.frame_width,
        height: config.frame_height,
        fps: Some(config.fps_limit.max(1)),
        ..Default::default()
    };

    let opened = {
        let source = config.video_source.clone();
        tokio::task::spawn_blocking(move || MjpegStream::open(&source, &options)).await
    };
    let mut stream = match opened {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return (SessionEnd::Failed(e), 0),
        Err(e) => return (SessionEnd::Failed(e.into()), 0),
    };

    let period = Duration::from_secs_f64(1.0 / f64::from(config.fps_limit.max(1)));
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return (SessionEnd::Cancelled, frames),
            _ = interval.tick() => {}
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
                let frame = VideoFrame::jpeg(
                    config.source_id.as_str(),
                    frames,
                    config.frame_width,
                    config.frame_height,
                    jpeg,
                );
                process_frame(state, analyzer, publisher, &frame).await;
            }
            Ok(None) => return (SessionEnd::Eof, frames),
            Err(e) => return (SessionEnd::Failed(e), frames),
        }
    }
}

async fn process_frame(
    state: &MonitorState,
    analyzer: &mut FrameAnalyzer,
    publisher: &FramePublisher,
    frame: &VideoFrame,
) {
    let report = match analyzer.analyze(frame).await {
        Ok(report) => report,
        Err(e) => {
            warn!(
                source = %frame.source_id,
                sequence = frame.sequence,
                error = %e,
                "frame analysis failed, skipping"
            );
            return;
        }
    };

    let source_id = state.config.source_id.as_str();
    MONITOR_FRAMES_PROCESSED
        .with_label_values(&[source_id, report.status.as_str()])
        .inc();
    MONITOR_PERSONS_DETECTED
        .with_label_values(&[source_id])
        .set(report.person_count as i64);
    MONITOR_RISK_LEVEL
        .with_label_values(&[source_id])
        .set(report.status.severity());
    if report.alert.is_some() {
        MONITOR_ALERTS_EMITTED.with_label_values(&[source_id]).inc();
    }

    state.apply_report(&report, analyzer.streak()).await;

    publisher.publish_frame(&report.frame).await;
    if let Some(alert) = &report.alert {
        publisher.publish_alert(alert).await;
    }

    if report.sequence % DENSITY_LOG_INTERVAL == 0 {
        info!(
            source = %frame.source_id,
            status = %report.status,
            "{}",
            analytics::density::density_line(
                report.person_count,
                analytics::density::DEFAULT_MAX_CAPACITY
            )
        );
    }
}
