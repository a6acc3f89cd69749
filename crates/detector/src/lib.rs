//! Person detection backends.
//!
//! The rest of the workspace treats detection as an opaque capability:
//! frame in, person bounding boxes out. [`create_detector`] picks the
//! backend from configuration.

use anyhow::Result;
use async_trait::async_trait;
use common::frames::{Detection, VideoFrame};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

pub mod mock;
pub mod onnx;

pub use mock::MockDetector;
pub use onnx::OnnxDetector;

/// A person detector backend.
#[async_trait]
pub trait PersonDetector: Send + Sync {
    /// Stable backend identifier (metric label)
    fn id(&self) -> &'static str;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Detect persons in a frame. The returned detections carry pixel
    /// coordinates of the source frame.
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>>;

    /// Whether the backend is ready to serve
    async fn health_check(&self) -> Result<bool>;
}

/// Detector backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Backend selector ("onnx" or "mock")
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Path to the YOLOv8 ONNX model file for person detection
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Confidence threshold for person detections (0.0 to 1.0)
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,

    /// IoU threshold for NMS
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Model input size (width and height)
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Attempt CUDA before falling back to CPU
    #[serde(default)]
    pub use_gpu: bool,

    /// GPU device ID
    #[serde(default)]
    pub device_id: i32,

    /// Number of intra-operation threads
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Number of inter-operation threads
    #[serde(default = "default_inter_threads")]
    pub inter_threads: usize,
}

fn default_backend() -> String {
    "mock".to_string()
}

fn default_model_path() -> String {
    "models/yolov8n.onnx".to_string()
}

fn default_confidence() -> f32 {
    0.10
}

fn default_iou_threshold() -> f32 {
    0.90
}

fn default_input_size() -> u32 {
    640
}

fn default_intra_threads() -> usize {
    4
}

fn default_inter_threads() -> usize {
    1
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model_path: default_model_path(),
            confidence_threshold: default_confidence(),
            iou_threshold: default_iou_threshold(),
            input_size: default_input_size(),
            use_gpu: false,
            device_id: 0,
            intra_threads: default_intra_threads(),
            inter_threads: default_inter_threads(),
        }
    }
}

impl DetectorConfig {
    /// Load configuration from environment variables, falling back to the
    /// serde defaults.
    pub fn from_env() -> Self {
        Self {
            backend: env::var("DETECTOR_BACKEND").unwrap_or_else(|_| default_backend()),
            model_path: env::var("MODEL_PATH").unwrap_or_else(|_| default_model_path()),
            confidence_threshold: env::var("DETECTOR_CONFIDENCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_confidence),
            iou_threshold: env::var("DETECTOR_IOU")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_iou_threshold),
            input_size: env::var("DETECTOR_INPUT_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_input_size),
            use_gpu: env::var("DETECTOR_USE_GPU")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            device_id: env::var("DETECTOR_DEVICE_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            intra_threads: env::var("DETECTOR_INTRA_THREADS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_intra_threads),
            inter_threads: env::var("DETECTOR_INTER_THREADS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_inter_threads),
        }
    }
}

/// Build the configured detector backend.
pub fn create_detector(config: &DetectorConfig) -> Result<Arc<dyn PersonDetector>> {
    match config.backend.to_lowercase().as_str() {
        "onnx" => Ok(Arc::new(OnnxDetector::load(config.clone())?)),
        "mock" => Ok(Arc::new(MockDetector::new())),
        other => anyhow::bail!("unknown detector backend: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.backend, "mock");
        assert_eq!(config.confidence_threshold, 0.10);
        assert_eq!(config.iou_threshold, 0.90);
        assert_eq!(config.input_size, 640);
        assert!(!config.use_gpu);
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{"backend": "onnx", "confidence_threshold": 0.3}"#).unwrap();
        assert_eq!(config.backend, "onnx");
        assert_eq!(config.confidence_threshold, 0.3);
        // Untouched fields keep their defaults
        assert_eq!(config.input_size, 640);
        assert_eq!(config.model_path, "models/yolov8n.onnx");
    }

    #[test]
    fn test_create_mock_detector() {
        let config = DetectorConfig::default();
        let detector = create_detector(&config).unwrap();
        assert_eq!(detector.id(), "mock_person_detector");
    }

    #[test]
    fn test_create_unknown_backend() {
        let config = DetectorConfig {
            backend: "tea-leaves".to_string(),
            ..Default::default()
        };
        assert!(create_detector(&config).is_err());
    }
}
