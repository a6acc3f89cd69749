//! Risk tiers and threshold configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Crowd risk tier, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    Normal,
    Warning,
    Critical,
}

impl RiskStatus {
    /// Numeric severity for gauges (0 = Normal, 1 = Warning, 2 = Critical).
    pub fn severity(&self) -> i64 {
        match self {
            RiskStatus::Normal => 0,
            RiskStatus::Warning => 1,
            RiskStatus::Critical => 2,
        }
    }

    /// Display label shown on overlays and dashboards.
    pub fn label(&self) -> &'static str {
        match self {
            RiskStatus::Normal => "Normal",
            RiskStatus::Warning => "High Density",
            RiskStatus::Critical => "CRITICAL RISK",
        }
    }

    /// Lowercase tier name, matching the serde encoding. Used for
    /// metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskStatus::Normal => "normal",
            RiskStatus::Warning => "warning",
            RiskStatus::Critical => "critical",
        }
    }

    /// CSS class used by the dashboard frontend for the status chip.
    pub fn css_class(&self) -> &'static str {
        match self {
            RiskStatus::Normal => "status-normal",
            RiskStatus::Warning => "status-warning",
            RiskStatus::Critical => "status-critical",
        }
    }

    /// RGB fill color used by the overlay renderer.
    pub fn color(&self) -> [u8; 3] {
        match self {
            RiskStatus::Normal => [0, 255, 0],
            RiskStatus::Warning => [255, 165, 0],
            RiskStatus::Critical => [255, 0, 0],
        }
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Threshold configuration for a video source.
///
/// All comparisons downstream are strict: a count equal to a threshold
/// does not cross it, and an elapsed time equal to the cooldown does not
/// re-arm an alert. Services construct this from their own environment
/// defaults; the serde defaults only back partial config payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Count above which the tier is at least Warning
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: usize,

    /// Count above which frames accumulate toward Critical
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: usize,

    /// Consecutive qualifying frames required before Critical.
    /// Zero escalates on the first qualifying frame.
    #[serde(default)]
    pub persistence_window: usize,

    /// Minimum seconds between emitted alerts
    #[serde(default = "default_alert_cooldown_secs")]
    pub alert_cooldown_secs: f64,
}

fn default_warning_threshold() -> usize {
    20
}

fn default_critical_threshold() -> usize {
    25
}

fn default_alert_cooldown_secs() -> f64 {
    5.0
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
            persistence_window: 0,
            alert_cooldown_secs: default_alert_cooldown_secs(),
        }
    }
}

/// Classify a single count without persistence. Used for overlay box
/// coloring, where the frame's own count picks the tier.
pub fn instantaneous_status(count: usize, thresholds: &RiskThresholds) -> RiskStatus {
    if count > thresholds.critical_threshold {
        RiskStatus::Critical
    } else if count > thresholds.warning_threshold {
        RiskStatus::Warning
    } else {
        RiskStatus::Normal
    }
}
