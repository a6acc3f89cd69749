use analytics::pipeline::FrameReport;
use analytics::{density, RiskStatus};
use common::frames::unix_millis;
use detector::PersonDetector;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;

/// Last-known capture state served by `/v1/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub person_count: usize,
    pub status: RiskStatus,
    pub status_label: &'static str,
    /// Consecutive frames strictly above the critical threshold
    pub streak: usize,
    pub frames_processed: u64,
    pub alerts_emitted: u64,
    pub density: String,
    pub last_frame_at: Option<u64>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            person_count: 0,
            status: RiskStatus::Normal,
            status_label: RiskStatus::Normal.label(),
            streak: 0,
            frames_processed: 0,
            alerts_emitted: 0,
            density: density::density_line(0, density::DEFAULT_MAX_CAPACITY),
            last_frame_at: None,
        }
    }
}

#[derive(Clone)]
pub struct MonitorState {
    pub config: Arc<Config>,
    pub detector: Arc<dyn PersonDetector>,
    snapshot: Arc<RwLock<StatusSnapshot>>,
}

impl MonitorState {
    pub fn new(config: Config, detector: Arc<dyn PersonDetector>) -> Self {
        Self {
            config: Arc::new(config),
            detector,
            snapshot: Arc::new(RwLock::new(StatusSnapshot::default())),
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Fold one frame report into the served snapshot.
    pub async fn apply_report(&self, report: &FrameReport, streak: usize) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.person_count = report.person_count;
        snapshot.status = report.status;
        snapshot.status_label = report.status.label();
        snapshot.streak = streak;
        snapshot.frames_processed += 1;
        if report.alert.is_some() {
            snapshot.alerts_emitted += 1;
        }
        snapshot.density =
            density::density_line(report.person_count, density::DEFAULT_MAX_CAPACITY);
        snapshot.last_frame_at = Some(unix_millis());
    }
}
