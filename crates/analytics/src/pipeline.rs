//! Shared frame analysis pipeline: decode, detect, debounce, overlay.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::frames::{Detection, VideoFrame};
use detector::PersonDetector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::debounce::AlertDebouncer;
use crate::overlay::{encode_jpeg, render_overlay, DEFAULT_JPEG_QUALITY};
use crate::risk::{RiskStatus, RiskThresholds};

/// Alert raised when a source sustains Critical past the persistence
/// window. Serialized to JSON for the alert topic and the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub source_id: String,
    pub status: RiskStatus,
    pub person_count: usize,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(source_id: impl Into<String>, status: RiskStatus, person_count: usize) -> Self {
        let source_id = source_id.into();
        let message = format!(
            "{}: {} persons detected on {}",
            status.label(),
            person_count,
            source_id
        );
        Self {
            id: Uuid::new_v4(),
            source_id,
            status,
            person_count,
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Output of one analyzed frame. `frame` holds the overlaid JPEG.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub source_id: String,
    pub sequence: u64,
    pub person_count: usize,
    pub status: RiskStatus,
    pub alert: Option<AlertEvent>,
    pub detections: Vec<Detection>,
    pub frame: Vec<u8>,
}

/// Per-source analysis pipeline. Owns the source's debouncer, so one
/// analyzer instance must see every frame of its source in order.
pub struct FrameAnalyzer {
    source_id: String,
    detector: Arc<dyn PersonDetector>,
    debouncer: AlertDebouncer,
    jpeg_quality: u8,
}

impl FrameAnalyzer {
    pub fn new(
        source_id: impl Into<String>,
        detector: Arc<dyn PersonDetector>,
        thresholds: RiskThresholds,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            detector,
            debouncer: AlertDebouncer::new(thresholds),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        self.debouncer.thresholds()
    }

    /// Current consecutive-high streak of the underlying debouncer.
    pub fn streak(&self) -> usize {
        self.debouncer.streak()
    }

    /// Clear debouncer state. Called when the source restarts.
    pub fn reset(&mut self) {
        self.debouncer.reset();
    }

    /// Run the full pipeline on one frame.
    ///
    /// Errors before the debouncer observation (decode or detection
    /// failures) leave its state untouched, so a skipped frame never
    /// breaks a streak.
    pub async fn analyze(&mut self, frame: &VideoFrame) -> Result<FrameReport> {
        let decoded = image::load_from_memory(&frame.data).with_context(|| {
            format!(
                "failed to decode frame {} from {}",
                frame.sequence, frame.source_id
            )
        })?;

        let detections = self.detector.detect(frame).await?;
        let count = detections.len();
        let assessment = self.debouncer.observe(count);

        let mut canvas = decoded.to_rgb8();
        render_overlay(
            &mut canvas,
            &detections,
            count,
            assessment.status,
            self.debouncer.thresholds(),
        );
        let overlaid = encode_jpeg(&canvas, self.jpeg_quality)?;

        let alert = if assessment.alert_due {
            Some(AlertEvent::new(
                self.source_id.clone(),
                assessment.status,
                count,
            ))
        } else {
            None
        };

        debug!(
            source = %self.source_id,
            sequence = frame.sequence,
            persons = count,
            status = %assessment.status,
            "frame analyzed"
        );

        Ok(FrameReport {
            source_id: self.source_id.clone(),
            sequence: frame.sequence,
            person_count: count,
            status: assessment.status,
            alert,
            detections,
            frame: overlaid,
        })
    }
}

/// One timeline entry of a file analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub sequence: u64,
    pub person_count: usize,
    pub status: RiskStatus,
}

/// Summary of an analyzed video file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub source_id: String,
    pub frames_analyzed: usize,
    pub peak_person_count: usize,
    pub mean_person_count: f64,
    pub normal_frames: usize,
    pub warning_frames: usize,
    pub critical_frames: usize,
    pub alerts: Vec<AlertEvent>,
    pub timeline: Vec<TimelinePoint>,
    #[serde(skip)]
    total_person_count: usize,
}

impl AnalysisReport {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            frames_analyzed: 0,
            peak_person_count: 0,
            mean_person_count: 0.0,
            normal_frames: 0,
            warning_frames: 0,
            critical_frames: 0,
            alerts: Vec::new(),
            timeline: Vec::new(),
            total_person_count: 0,
        }
    }

    /// Fold one frame report into the summary.
    pub fn record(&mut self, report: &FrameReport) {
        self.frames_analyzed += 1;
        self.total_person_count += report.person_count;
        self.peak_person_count = self.peak_person_count.max(report.person_count);
        self.mean_person_count = self.total_person_count as f64 / self.frames_analyzed as f64;

        match report.status {
            RiskStatus::Normal => self.normal_frames += 1,
            RiskStatus::Warning => self.warning_frames += 1,
            RiskStatus::Critical => self.critical_frames += 1,
        }

        if let Some(alert) = &report.alert {
            self.alerts.push(alert.clone());
        }

        self.timeline.push(TimelinePoint {
            sequence: report.sequence,
            person_count: report.person_count,
            status: report.status,
        });
    }
}
