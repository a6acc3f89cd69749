use analytics::RiskThresholds;
use detector::DetectorConfig;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Dashboard configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP/WebSocket server binds to
    pub bind_addr: String,
    /// Optional always-on source for the live view. When unset the
    /// dashboard serves file analysis only.
    pub live_source: Option<String>,
    /// Risk thresholds applied to both the live view and uploads
    pub thresholds: RiskThresholds,
    /// Push a status message to WebSocket clients every N frames
    pub status_update_interval: u64,
    /// Frame sample rate for uploaded-file analysis
    pub analysis_sample_fps: u32,
    /// Upload size cap in megabytes
    pub max_upload_mb: usize,
    /// Directory holding the static frontend
    pub frontend_dir: PathBuf,
    /// Person detector configuration
    pub detector: DetectorConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            bind_addr: env::var("DASHBOARD_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:9400".to_string()),
            live_source: env::var("DASHBOARD_LIVE_SOURCE")
                .ok()
                .filter(|v| !v.is_empty()),
            thresholds: RiskThresholds {
                warning_threshold: env_parse("WARNING_THRESHOLD", 20),
                critical_threshold: env_parse("CRITICAL_THRESHOLD", 25),
                // The live view reacts on the first frame over the
                // critical threshold unless operators opt in to a window.
                persistence_window: env_parse("PERSISTENCE_WINDOW", 0),
                alert_cooldown_secs: env_parse("ALERT_COOLDOWN_SECS", 5.0),
            },
            status_update_interval: env_parse("STATUS_UPDATE_INTERVAL", 10),
            analysis_sample_fps: env_parse("ANALYSIS_SAMPLE_FPS", 5),
            max_upload_mb: env_parse("MAX_UPLOAD_MB", 200),
            frontend_dir: env::var("FRONTEND_DIR")
                .unwrap_or_else(|_| "./crates/dashboard-ui/frontend".to_string())
                .into(),
            detector: DetectorConfig::from_env(),
        })
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_defaults() {
        for key in [
            "DASHBOARD_BIND_ADDR",
            "DASHBOARD_LIVE_SOURCE",
            "WARNING_THRESHOLD",
            "CRITICAL_THRESHOLD",
            "PERSISTENCE_WINDOW",
            "ALERT_COOLDOWN_SECS",
            "STATUS_UPDATE_INTERVAL",
            "ANALYSIS_SAMPLE_FPS",
            "MAX_UPLOAD_MB",
            "FRONTEND_DIR",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9400");
        assert_eq!(config.live_source, None);
        assert_eq!(config.thresholds.warning_threshold, 20);
        assert_eq!(config.thresholds.critical_threshold, 25);
        assert_eq!(config.thresholds.persistence_window, 0);
        assert_eq!(config.thresholds.alert_cooldown_secs, 5.0);
        assert_eq!(config.status_update_interval, 10);
        assert_eq!(config.analysis_sample_fps, 5);
        assert_eq!(config.max_upload_mb, 200);
        assert_eq!(config.frontend_dir, PathBuf::from("./crates/dashboard-ui/frontend"));
    }

    #[test]
    fn test_empty_live_source_is_none() {
        env::set_var("DASHBOARD_LIVE_SOURCE", "");
        let config = Config::from_env().unwrap();
        assert_eq!(config.live_source, None);
        env::remove_var("DASHBOARD_LIVE_SOURCE");
    }

    #[test]
    fn test_env_parse_fallbacks() {
        env::remove_var("DASHBOARD_TEST_UNSET");
        assert_eq!(env_parse("DASHBOARD_TEST_UNSET", 10u64), 10);

        env::set_var("DASHBOARD_TEST_BAD", "not-a-number");
        assert_eq!(env_parse("DASHBOARD_TEST_BAD", 5usize), 5);
        env::remove_var("DASHBOARD_TEST_BAD");

        env::set_var("DASHBOARD_TEST_SET", "42");
        assert_eq!(env_parse("DASHBOARD_TEST_SET", 0u32), 42);
        env::remove_var("DASHBOARD_TEST_SET");
    }
}
