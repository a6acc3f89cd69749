use analytics::RiskThresholds;
use detector::DetectorConfig;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub video_source: String,
    pub source_id: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub fps_limit: u32,
    pub thresholds: RiskThresholds,
    pub mqtt_broker_host: String,
    pub mqtt_broker_port: u16,
    pub mqtt_frame_topic: String,
    pub mqtt_alert_topic: String,
    /// Quality of published overlay JPEGs (0 to 100)
    pub jpeg_quality: u8,
    pub detector: DetectorConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            bind_addr: env::var("MONITOR_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9401".to_string()),
            video_source: env::var("VIDEO_SOURCE").unwrap_or_else(|_| "/dev/video0".to_string()),
            source_id: env::var("SOURCE_ID").unwrap_or_else(|_| "monitor-0".to_string()),
            frame_width: env_parse("FRAME_WIDTH", 640),
            frame_height: env_parse("FRAME_HEIGHT", 480),
            fps_limit: env_parse("FPS_LIMIT", 15),
            thresholds: RiskThresholds {
                warning_threshold: env_parse("WARNING_THRESHOLD", 30),
                critical_threshold: env_parse("CRITICAL_THRESHOLD", 50),
                // 3 seconds of sustained load at the default 15 fps
                persistence_window: env_parse("PERSISTENCE_WINDOW", 45),
                alert_cooldown_secs: env_parse("ALERT_COOLDOWN_SECS", 5.0),
            },
            mqtt_broker_host: env::var("MQTT_BROKER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            mqtt_broker_port: env_parse("MQTT_BROKER_PORT", 1883),
            mqtt_frame_topic: env::var("MQTT_FRAME_TOPIC")
                .unwrap_or_else(|_| "crowd-stream".to_string()),
            mqtt_alert_topic: env::var("MQTT_ALERT_TOPIC")
                .unwrap_or_else(|_| "crowd-stream/alerts".to_string()),
            jpeg_quality: env_parse("JPEG_QUALITY", 60),
            detector: DetectorConfig::from_env(),
        })
    }
}

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
