/// End-to-end analyzer flow with scripted detections: status
/// progression, alert emission, and report aggregation over a short
/// surge-recover-surge clip.
use analytics::pipeline::FrameReport;
use analytics::{AnalysisReport, FrameAnalyzer, RiskStatus, RiskThresholds};
use anyhow::Result;
use async_trait::async_trait;
use common::frames::{Detection, VideoFrame};
use detector::mock::MockDetector;
use detector::PersonDetector;
use image::{ImageBuffer, Rgb};
use std::sync::Arc;

/// Two surges over the critical threshold with a one-frame dip between.
const COUNTS: [usize; 9] = [30, 30, 30, 30, 10, 30, 30, 30, 30];

fn thresholds() -> RiskThresholds {
    RiskThresholds {
        warning_threshold: 20,
        critical_threshold: 25,
        persistence_window: 3,
        alert_cooldown_secs: 0.0,
    }
}

fn jpeg_frame(sequence: u64) -> VideoFrame {
    let image: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(96, 72, Rgb([32, 32, 32]));
    let mut jpeg = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut std::io::Cursor::new(&mut jpeg), 85)
        .encode_image(&image)
        .unwrap();
    VideoFrame::jpeg("gate-3", sequence, 96, 72, jpeg)
}

async fn run_scenario() -> Vec<FrameReport> {
    let detector = Arc::new(MockDetector::with_counts(COUNTS.to_vec()));
    let mut analyzer = FrameAnalyzer::new("gate-3", detector, thresholds());

    let mut reports = Vec::with_capacity(COUNTS.len());
    for sequence in 0..COUNTS.len() as u64 {
        let report = analyzer.analyze(&jpeg_frame(sequence)).await.unwrap();
        reports.push(report);
    }
    reports
}

#[tokio::test]
async fn test_surge_recover_surge_statuses() {
    let reports = run_scenario().await;

    let statuses: Vec<RiskStatus> = reports.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            RiskStatus::Warning,
            RiskStatus::Warning,
            RiskStatus::Warning,
            RiskStatus::Critical,
            RiskStatus::Normal,
            RiskStatus::Warning,
            RiskStatus::Warning,
            RiskStatus::Warning,
            RiskStatus::Critical,
        ]
    );
}

#[tokio::test]
async fn test_alerts_fire_on_each_sustained_surge() {
    let reports = run_scenario().await;

    let alert_frames: Vec<usize> = reports
        .iter()
        .enumerate()
        .filter(|(_, r)| r.alert.is_some())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(alert_frames, vec![3, 8]);

    let first = reports[3].alert.as_ref().unwrap();
    assert_eq!(first.source_id, "gate-3");
    assert_eq!(first.status, RiskStatus::Critical);
    assert_eq!(first.person_count, 30);
    assert_eq!(first.message, "CRITICAL RISK: 30 persons detected on gate-3");
    assert!(first.timestamp <= chrono::Utc::now());

    let second = reports[8].alert.as_ref().unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_report_aggregation() {
    let reports = run_scenario().await;

    let mut summary = AnalysisReport::new("gate-3");
    for report in &reports {
        summary.record(report);
    }

    assert_eq!(summary.frames_analyzed, 9);
    assert_eq!(summary.peak_person_count, 30);
    assert_eq!(summary.normal_frames, 1);
    assert_eq!(summary.warning_frames, 6);
    assert_eq!(summary.critical_frames, 2);
    assert_eq!(summary.alerts.len(), 2);
    assert_eq!(summary.timeline.len(), 9);
    assert!((summary.mean_person_count - 250.0 / 9.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_overlaid_frames_decode_at_source_size() {
    let reports = run_scenario().await;

    for report in &reports {
        let decoded = image::load_from_memory(&report.frame).unwrap();
        assert_eq!(decoded.width(), 96);
        assert_eq!(decoded.height(), 72);
    }
    assert_eq!(reports[0].detections.len(), 30);
}

struct FailingDetector;

#[async_trait]
impl PersonDetector for FailingDetector {
    fn id(&self) -> &'static str {
        "failing_detector"
    }

    fn name(&self) -> &'static str {
        "Failing Detector"
    }

    async fn detect(&self, _frame: &VideoFrame) -> Result<Vec<Detection>> {
        anyhow::bail!("inference backend offline")
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_detector_failure_leaves_streak_untouched() {
    let mut analyzer = FrameAnalyzer::new("gate-3", Arc::new(FailingDetector), thresholds());

    let err = analyzer.analyze(&jpeg_frame(0)).await.unwrap_err();
    assert!(err.to_string().contains("inference backend offline"));
    assert_eq!(analyzer.streak(), 0);
}
