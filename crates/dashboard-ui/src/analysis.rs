//! Uploaded-file analysis: sample frames out of a video file and walk
//! them through a fresh analyzer, folding every frame into a report.

use analytics::{AnalysisReport, FrameAnalyzer};
use anyhow::Result;
use common::frame_extractor::probe_frame_dimensions;
use common::frames::VideoFrame;
use common::mjpeg::{MjpegOptions, MjpegStream};
use std::path::Path;
use tracing::{debug, warn};

use crate::state::DashboardState;

/// Container formats accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi"];

/// Source name reports carry for uploaded files.
pub const UPLOAD_SOURCE_ID: &str = "upload";

pub fn extension_allowed(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Analyze the video file at `path` at the configured sample rate.
/// Frames that fail analysis are skipped, not fatal.
pub async fn analyze_file(state: &DashboardState, path: &Path) -> Result<AnalysisReport> {
    let uri = path.to_string_lossy().to_string();

    let (width, height) = {
        let uri = uri.clone();
        tokio::task::spawn_blocking(move || probe_frame_dimensions(&uri)).await??
    };
    debug!(width, height, "probed upload dimensions");

    // Decode as fast as the file allows, sampling down to the
    // analysis rate.
    let options = MjpegOptions {
        width: 0,
        height: 0,
        fps: Some(state.config.analysis_sample_fps.max(1)),
        realtime: false,
        ..Default::default()
    };

    let mut stream = {
        let uri = uri.clone();
        let options = options.clone();
        tokio::task::spawn_blocking(move || MjpegStream::open(&uri, &options)).await??
    };

    let mut analyzer = FrameAnalyzer::new(
        UPLOAD_SOURCE_ID,
        state.detector.clone(),
        state.config.thresholds.clone(),
    );
    let mut report = AnalysisReport::new(UPLOAD_SOURCE_ID);
    let mut sequence: u64 = 0;

    loop {
        let read = tokio::task::spawn_blocking(move || {
            let mut stream = stream;
            let result = stream.next_frame();
            (stream, result)
        })
        .await?;
        let (returned, result) = read;
        stream = returned;

        match result? {
            Some(jpeg) => {
                sequence += 1;
                let frame = VideoFrame::jpeg(UPLOAD_SOURCE_ID, sequence, width, height, jpeg);
                match analyzer.analyze(&frame).await {
                    Ok(frame_report) => report.record(&frame_report),
                    Err(e) => {
                        warn!(sequence, error = %e, "skipping unreadable frame");
                    }
                }
            }
            None => break,
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_allowed() {
        assert!(extension_allowed("crowd.mp4"));
        assert!(extension_allowed("FOOTAGE.AVI"));
        assert!(!extension_allowed("clip.mkv"));
        assert!(!extension_allowed("notes.txt"));
        assert!(!extension_allowed("no-extension"));
    }
}
