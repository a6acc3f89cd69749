//! Alert debouncer: smooths a noisy per-frame count into a stable status.

use std::time::Instant;

use crate::risk::{RiskStatus, RiskThresholds};

/// Per-frame debouncer decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub status: RiskStatus,
    pub person_count: usize,
    /// True when a Critical alert should be sent now. The debouncer only
    /// decides; the caller performs the send.
    pub alert_due: bool,
}

/// State machine converting person counts into a risk status.
///
/// One instance per video source. A frame counts toward Critical only
/// while its count is strictly above the critical threshold; the streak
/// resets the instant a count falls to or below it. Critical requires
/// strictly more than `persistence_window` consecutive qualifying
/// frames, so transient spikes surface as Warning at most.
#[derive(Debug)]
pub struct AlertDebouncer {
    thresholds: RiskThresholds,
    consecutive_high_count: usize,
    last_alert_at: Option<Instant>,
}

impl AlertDebouncer {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self {
            thresholds,
            consecutive_high_count: 0,
            last_alert_at: None,
        }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Consecutive observations strictly above the critical threshold.
    pub fn streak(&self) -> usize {
        self.consecutive_high_count
    }

    /// Record one frame's person count at the given instant.
    ///
    /// The first sustained Critical emits immediately; afterwards an
    /// alert is due only when strictly more than the cooldown has
    /// elapsed since the last one.
    pub fn observe_at(&mut self, count: usize, at: Instant) -> RiskAssessment {
        if count > self.thresholds.critical_threshold {
            self.consecutive_high_count += 1;
        } else {
            self.consecutive_high_count = 0;
        }

        let status = if self.consecutive_high_count > self.thresholds.persistence_window {
            RiskStatus::Critical
        } else if count > self.thresholds.warning_threshold {
            RiskStatus::Warning
        } else {
            RiskStatus::Normal
        };

        let mut alert_due = false;
        if status == RiskStatus::Critical {
            let cooldown_over = match self.last_alert_at {
                None => true,
                Some(last) => {
                    at.duration_since(last).as_secs_f64() > self.thresholds.alert_cooldown_secs
                }
            };
            if cooldown_over {
                self.last_alert_at = Some(at);
                alert_due = true;
            }
        }

        RiskAssessment {
            status,
            person_count: count,
            alert_due,
        }
    }

    /// Record one frame's person count now.
    pub fn observe(&mut self, count: usize) -> RiskAssessment {
        self.observe_at(count, Instant::now())
    }

    /// Clear streak and cooldown state. Used when a source restarts.
    pub fn reset(&mut self) {
        self.consecutive_high_count = 0;
        self.last_alert_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn thresholds(warning: usize, critical: usize, window: usize) -> RiskThresholds {
        RiskThresholds {
            warning_threshold: warning,
            critical_threshold: critical,
            persistence_window: window,
            alert_cooldown_secs: 5.0,
        }
    }

    #[test]
    fn test_counts_at_or_below_warning_stay_normal() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 3));
        let t = Instant::now();

        for count in [0, 1, 10, 19, 20] {
            let assessment = debouncer.observe_at(count, t);
            assert_eq!(assessment.status, RiskStatus::Normal, "count {}", count);
            assert_eq!(debouncer.streak(), 0);
        }
    }

    #[test]
    fn test_counts_between_thresholds_are_warning() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 3));
        let t = Instant::now();

        for count in 21..=25 {
            let assessment = debouncer.observe_at(count, t);
            assert_eq!(assessment.status, RiskStatus::Warning, "count {}", count);
        }
        // Counts at the critical threshold never started a streak
        assert_eq!(debouncer.streak(), 0);
    }

    #[test]
    fn test_critical_requires_window_plus_one_frames() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 3));
        let t = Instant::now();

        for i in 1..=3 {
            let assessment = debouncer.observe_at(26, t);
            assert_eq!(assessment.status, RiskStatus::Warning, "frame {}", i);
            assert_eq!(debouncer.streak(), i);
        }
        let assessment = debouncer.observe_at(26, t);
        assert_eq!(assessment.status, RiskStatus::Critical);
        assert_eq!(debouncer.streak(), 4);
    }

    #[test]
    fn test_single_drop_resets_streak() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 3));
        let t = Instant::now();

        for _ in 0..10 {
            debouncer.observe_at(40, t);
        }
        assert_eq!(debouncer.streak(), 10);

        // A count equal to the critical threshold is not above it
        let assessment = debouncer.observe_at(25, t);
        assert_eq!(debouncer.streak(), 0);
        assert_eq!(assessment.status, RiskStatus::Warning);
    }

    #[test]
    fn test_status_sequence_with_recovery() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 3));
        let t = Instant::now();

        let counts = [30, 30, 30, 30, 10, 30, 30, 30, 30];
        let expected = [
            RiskStatus::Warning,
            RiskStatus::Warning,
            RiskStatus::Warning,
            RiskStatus::Critical,
            RiskStatus::Normal,
            RiskStatus::Warning,
            RiskStatus::Warning,
            RiskStatus::Warning,
            RiskStatus::Critical,
        ];

        let statuses: Vec<RiskStatus> = counts
            .iter()
            .map(|&count| debouncer.observe_at(count, t).status)
            .collect();
        assert_eq!(statuses, expected);
    }

    #[test]
    fn test_zero_window_escalates_on_first_frame() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 0));
        let t = Instant::now();

        let assessment = debouncer.observe_at(26, t);
        assert_eq!(assessment.status, RiskStatus::Critical);
        assert!(assessment.alert_due);
    }

    #[test]
    fn test_alert_cooldown_is_strict() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 0));
        let t0 = Instant::now();

        // First sustained Critical alerts immediately
        assert!(debouncer.observe_at(30, t0).alert_due);

        // Still critical inside the cooldown
        let inside = debouncer.observe_at(30, t0 + Duration::from_secs(1));
        assert_eq!(inside.status, RiskStatus::Critical);
        assert!(!inside.alert_due);

        // Elapsed exactly equal to the cooldown does not re-arm
        assert!(!debouncer.observe_at(30, t0 + Duration::from_secs(5)).alert_due);

        // Strictly past it does
        assert!(
            debouncer
                .observe_at(30, t0 + Duration::from_millis(5001))
                .alert_due
        );
    }

    #[test]
    fn test_cooldown_measured_from_last_emission() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 0));
        let t0 = Instant::now();

        assert!(debouncer.observe_at(30, t0).alert_due);
        let t1 = t0 + Duration::from_millis(5001);
        assert!(debouncer.observe_at(30, t1).alert_due);

        // 5s after t0 but only ~1s after t1
        assert!(!debouncer.observe_at(30, t0 + Duration::from_secs(6)).alert_due);
    }

    #[test]
    fn test_no_alert_outside_critical() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 3));
        let t = Instant::now();

        assert!(!debouncer.observe_at(24, t).alert_due);
        assert!(!debouncer.observe_at(5, t).alert_due);
    }

    #[test]
    fn test_reset_clears_streak_and_cooldown() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 1));
        let t = Instant::now();

        debouncer.observe_at(30, t);
        assert!(debouncer.observe_at(30, t).alert_due);

        debouncer.reset();
        assert_eq!(debouncer.streak(), 0);

        // Fresh instance semantics: streak rebuilds, first alert immediate
        let warm = debouncer.observe_at(30, t);
        assert_eq!(warm.status, RiskStatus::Warning);
        let critical = debouncer.observe_at(30, t);
        assert_eq!(critical.status, RiskStatus::Critical);
        assert!(critical.alert_due);
    }

    #[test]
    fn test_assessment_carries_count() {
        let mut debouncer = AlertDebouncer::new(thresholds(20, 25, 0));
        let assessment = debouncer.observe(17);
        assert_eq!(assessment.person_count, 17);
        assert_eq!(assessment.status, RiskStatus::Normal);
    }
}
