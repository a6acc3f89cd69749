//! Continuous frame capture from video sources via FFmpeg.
//!
//! Spawns a long-running ffmpeg child that writes concatenated JPEGs
//! (`-f mjpeg`) to stdout and splits the byte stream back into frames on
//! the JPEG SOI/EOI markers.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

use crate::frame_extractor::scale_filter;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Give up on a frame that never terminates; a corrupt stream resyncs here.
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Classification of a video source URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// V4L2 capture device (`/dev/video0` or the `video:0` shorthand)
    Device,
    /// Network stream (rtsp/http/https)
    Network,
    /// Local video file
    File,
}

impl SourceKind {
    pub fn classify(source_uri: &str) -> Self {
        if source_uri.starts_with("/dev/video") || source_uri.starts_with("video:") {
            Self::Device
        } else if source_uri.starts_with("rtsp://")
            || source_uri.starts_with("http://")
            || source_uri.starts_with("https://")
        {
            Self::Network
        } else {
            Self::File
        }
    }
}

/// Resolve the `video:N` shorthand to a device path.
fn device_path(source_uri: &str) -> String {
    match source_uri.strip_prefix("video:") {
        Some(index) => format!("/dev/video{}", index),
        None => source_uri.to_string(),
    }
}

/// Capture options for an MJPEG stream.
#[derive(Debug, Clone)]
pub struct MjpegOptions {
    /// Output width (0 = auto)
    pub width: u32,
    /// Output height (0 = auto)
    pub height: u32,
    /// JPEG quality on the ffmpeg `-q:v` scale (2 best, 31 worst)
    pub quality: u32,
    /// Frame rate cap applied at the source
    pub fps: Option<u32>,
    /// Pace file playback at native speed (`-re`); analysis runs disable
    /// this to walk the file as fast as it decodes
    pub realtime: bool,
}

impl Default for MjpegOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            quality: 5,
            fps: None,
            realtime: true,
        }
    }
}

/// Build the ffmpeg argument list for a continuous MJPEG capture.
pub fn build_ffmpeg_args(source_uri: &str, options: &MjpegOptions) -> Vec<String> {
    let kind = SourceKind::classify(source_uri);
    let mut args: Vec<String> = Vec::new();

    match kind {
        SourceKind::Device => {
            args.push("-f".to_string());
            args.push("v4l2".to_string());
            if let Some(fps) = options.fps {
                args.push("-framerate".to_string());
                args.push(fps.to_string());
            }
            if options.width > 0 && options.height > 0 {
                args.push("-video_size".to_string());
                args.push(format!("{}x{}", options.width, options.height));
            }
            args.push("-i".to_string());
            args.push(device_path(source_uri));
        }
        SourceKind::Network => {
            if source_uri.starts_with("rtsp://") {
                args.push("-rtsp_transport".to_string());
                args.push("tcp".to_string());
            }
            args.push("-i".to_string());
            args.push(source_uri.to_string());
        }
        SourceKind::File => {
            if options.realtime {
                args.push("-re".to_string());
            }
            args.push("-i".to_string());
            args.push(source_uri.to_string());
        }
    }

    args.push("-an".to_string());

    let mut filters: Vec<String> = Vec::new();
    if let Some(filter) = scale_filter(options.width, options.height) {
        filters.push(filter);
    }
    // Devices are rate-capped at the input instead
    if kind != SourceKind::Device {
        if let Some(fps) = options.fps {
            filters.push(format!("fps={}", fps));
        }
    }
    if !filters.is_empty() {
        args.push("-vf".to_string());
        args.push(filters.join(","));
    }

    args.push("-q:v".to_string());
    args.push(options.quality.clamp(2, 31).to_string());
    args.push("-f".to_string());
    args.push("mjpeg".to_string());
    args.push("pipe:1".to_string());

    args
}

/// A running ffmpeg capture delivering one JPEG per [`MjpegStream::next_frame`].
///
/// The child process is killed when the stream is dropped.
pub struct MjpegStream {
    child: Child,
    reader: MjpegFrameReader<ChildStdout>,
    source_uri: String,
}

impl MjpegStream {
    pub fn open(source_uri: &str, options: &MjpegOptions) -> Result<Self> {
        let args = build_ffmpeg_args(source_uri, options);
        debug!(source = %source_uri, args = ?args, "spawning ffmpeg mjpeg capture");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn ffmpeg")?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdout unavailable"))?;

        info!(source = %source_uri, "mjpeg capture started");
        Ok(Self {
            child,
            reader: MjpegFrameReader::new(stdout),
            source_uri: source_uri.to_string(),
        })
    }

    /// Blocking read of the next complete JPEG frame.
    ///
    /// Returns `None` when the source ends (file EOF or ffmpeg exit).
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        self.reader
            .next_frame()
            .with_context(|| format!("reading mjpeg stream from {}", self.source_uri))
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }
}

impl Drop for MjpegStream {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!(source = %self.source_uri, error = %e, "failed to kill ffmpeg child");
        }
        let _ = self.child.wait();
    }
}

/// Splits a raw MJPEG byte stream into individual JPEG frames.
///
/// Garbage before a start marker is discarded; a partial trailing frame is
/// withheld until completed or dropped at EOF.
pub struct MjpegFrameReader<R: Read> {
    inner: R,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: Read> MjpegFrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(64 * 1024),
            eof: false,
        }
    }

    /// Next complete JPEG, or `None` at end of stream.
    pub fn next_frame(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(frame) = self.extract_frame() {
                return Ok(Some(frame));
            }
            if self.eof {
                return Ok(None);
            }

            let mut chunk = [0u8; 16 * 1024];
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                self.eof = true;
                continue;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn extract_frame(&mut self) -> Option<Vec<u8>> {
        match find_marker(&self.buf, &SOI) {
            Some(start) => {
                if start > 0 {
                    self.buf.drain(..start);
                }
            }
            None => {
                // No start marker; keep one byte in case it is half a marker
                if self.buf.len() > 1 {
                    let keep_from = self.buf.len() - 1;
                    self.buf.drain(..keep_from);
                }
                return None;
            }
        }

        match find_marker(&self.buf[2..], &EOI) {
            Some(rel) => {
                let end = rel + 2 + EOI.len();
                let frame: Vec<u8> = self.buf.drain(..end).collect();
                Some(frame)
            }
            None => {
                if self.buf.len() > MAX_FRAME_BYTES {
                    // Unterminated frame, drop its start marker and resync
                    self.buf.drain(..SOI.len());
                }
                None
            }
        }
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}
