//! Frame and detection contracts shared across the workspace.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Object class label produced by the person detector.
pub const PERSON_CLASS: &str = "person";

/// A single captured video frame carrying encoded image bytes.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Logical source name (e.g., "hall-east", "upload")
    pub source_id: String,

    /// Frame timestamp (Unix timestamp in milliseconds)
    pub timestamp: u64,

    /// Frame sequence number, monotonic per source
    pub sequence: u64,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Image format (e.g., "jpeg")
    pub format: String,

    /// Encoded image bytes
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Build a JPEG frame stamped with the current wall-clock time.
    pub fn jpeg(
        source_id: impl Into<String>,
        sequence: u64,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            timestamp: unix_millis(),
            sequence,
            width,
            height,
            format: "jpeg".to_string(),
            data,
        }
    }
}

/// Current time as Unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Detection result from a detector backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Object class/label
    pub class: String,

    /// Detection confidence (0.0 to 1.0)
    pub confidence: f32,

    /// Bounding box (x, y, width, height)
    pub bbox: BoundingBox,
}

/// Bounding box in pixel coordinates of the source frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Exclusive right edge, saturating at u32::MAX.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at u32::MAX.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_serialization() {
        let detection = Detection {
            class: PERSON_CLASS.to_string(),
            confidence: 0.87,
            bbox: BoundingBox {
                x: 100,
                y: 200,
                width: 50,
                height: 120,
            },
        };

        let json = serde_json::to_string(&detection).unwrap();
        let deserialized: Detection = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.class, detection.class);
        assert_eq!(deserialized.confidence, detection.confidence);
        assert_eq!(deserialized.bbox.width, 50);
    }

    #[test]
    fn test_bbox_edges() {
        let bbox = BoundingBox {
            x: 10,
            y: 20,
            width: 30,
            height: 40,
        };
        assert_eq!(bbox.right(), 40);
        assert_eq!(bbox.bottom(), 60);

        let huge = BoundingBox {
            x: u32::MAX - 1,
            y: 0,
            width: 10,
            height: 10,
        };
        assert_eq!(huge.right(), u32::MAX);
    }

    #[test]
    fn test_jpeg_frame_constructor() {
        let frame = VideoFrame::jpeg("hall-east", 7, 640, 480, vec![0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(frame.source_id, "hall-east");
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.format, "jpeg");
        assert!(frame.timestamp > 0);
        assert_eq!(frame.data.len(), 4);
    }
}
