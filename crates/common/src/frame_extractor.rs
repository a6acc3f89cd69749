//! Single-frame extraction from video sources via FFmpeg.
//!
//! Used for source preflight checks and thumbnails; continuous capture
//! lives in [`crate::mjpeg`].

use anyhow::{Context, Result};
use std::process::{Command, Stdio};
use tracing::{debug, error, warn};

/// Build an ffmpeg scale filter for the requested dimensions.
///
/// Zero means auto: one zero keeps the aspect ratio, both zeros skip
/// scaling entirely.
pub(crate) fn scale_filter(width: u32, height: u32) -> Option<String> {
    if width == 0 && height == 0 {
        return None;
    }
    let filter = if width > 0 && height > 0 {
        format!("scale={}:{}", width, height)
    } else if width > 0 {
        format!("scale={}:-1", width)
    } else {
        format!("scale=-1:{}", height)
    };
    Some(filter)
}

/// Extract a single JPEG frame from a video source.
///
/// `quality` is the ffmpeg `-q:v` scale (2 best, 31 worst). The returned
/// bytes are a complete JPEG image.
pub fn extract_frame_jpeg(
    source_uri: &str,
    width: u32,
    height: u32,
    quality: u32,
) -> Result<Vec<u8>> {
    debug!(
        source = %source_uri,
        width = width,
        height = height,
        quality = quality,
        "extracting frame from video source"
    );

    let mut args = vec![
        "-i".to_string(),
        source_uri.to_string(),
        "-vframes".to_string(),
        "1".to_string(),
        "-f".to_string(),
        "image2pipe".to_string(),
    ];

    if let Some(filter) = scale_filter(width, height) {
        args.push("-vf".to_string());
        args.push(filter);
    }

    args.push("-q:v".to_string());
    args.push(quality.clamp(2, 31).to_string());
    args.push("pipe:1".to_string());

    let output = Command::new("ffmpeg")
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .context("failed to execute ffmpeg")?;

    if !output.status.success() {
        error!(
            source = %source_uri,
            status = ?output.status,
            "ffmpeg frame extraction failed"
        );
        anyhow::bail!("ffmpeg exited with error: {:?}", output.status);
    }

    if output.stdout.is_empty() {
        warn!(source = %source_uri, "ffmpeg returned empty frame data");
        anyhow::bail!("ffmpeg returned no frame data");
    }

    Ok(output.stdout)
}

/// Probe a source's frame dimensions with ffprobe.
///
/// Returns (width, height).
pub fn probe_frame_dimensions(source_uri: &str) -> Result<(u32, u32)> {
    debug!(source = %source_uri, "probing video dimensions");

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0",
            source_uri,
        ])
        .output()
        .context("failed to execute ffprobe")?;

    if !output.status.success() {
        anyhow::bail!("ffprobe failed: {:?}", output.status);
    }

    let output_str =
        String::from_utf8(output.stdout).context("ffprobe output is not valid UTF-8")?;

    let dimensions: Vec<&str> = output_str.trim().split(',').collect();
    if dimensions.len() != 2 {
        anyhow::bail!("unexpected ffprobe output format: {}", output_str);
    }

    let width: u32 = dimensions[0].parse().context("failed to parse width")?;
    let height: u32 = dimensions[1].parse().context("failed to parse height")?;

    Ok((width, height))
}
