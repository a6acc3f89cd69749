use analytics::pipeline::FrameReport;
use analytics::{density, RiskStatus};
use common::frames::unix_millis;
use detector::PersonDetector;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::Config;
use crate::live::LiveUpdate;

/// Frames a slow WebSocket client may fall behind before it starts
/// dropping updates.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Last-known live-view state served by `/v1/status`.
#[derive(Debug, Clone, Serialize)]
pub struct LiveSnapshot {
    /// Whether a capture session is currently delivering frames
    pub running: bool,
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

impl Default for LiveSnapshot {
    fn default() -> Self {
        Self {
            running: false,
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
pub struct DashboardState {
    pub config: Arc<Config>,
    pub detector: Arc<dyn PersonDetector>,
    /// Fan-out of live frames to connected WebSocket clients
    pub updates: broadcast::Sender<LiveUpdate>,
    live: Arc<RwLock<LiveSnapshot>>,
}

impl DashboardState {
    pub fn new(config: Config, detector: Arc<dyn PersonDetector>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            config: Arc::new(config),
            detector,
            updates,
            live: Arc::new(RwLock::new(LiveSnapshot::default())),
        }
    }

    pub async fn live_snapshot(&self) -> LiveSnapshot {
        self.live.read().await.clone()
    }

    pub async fn set_live_running(&self, running: bool) {
        self.live.write().await.running = running;
    }

    /// Fold one live frame report into the served snapshot.
    pub async fn apply_live_report(&self, report: &FrameReport, streak: usize) {
        let mut live = self.live.write().await;
        live.running = true;
        live.person_count = report.person_count;
        live.status = report.status;
        live.status_label = report.status.label();
        live.streak = streak;
        live.frames_processed += 1;
        if report.alert.is_some() {
            live.alerts_emitted += 1;
        }
        live.density = density::density_line(report.person_count, density::DEFAULT_MAX_CAPACITY);
        live.last_frame_at = Some(unix_millis());
    }
}
