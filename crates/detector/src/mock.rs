//! Deterministic detector for development and tests.

use anyhow::Result;
use async_trait::async_trait;
use common::frames::{BoundingBox, Detection, VideoFrame, PERSON_CLASS};

use crate::PersonDetector;

/// Produces synthetic person detections without a model. Output is a
/// pure function of the frame sequence number, so repeated runs over the
/// same frames give identical results.
pub struct MockDetector {
    scripted_counts: Option<Vec<usize>>,
}

impl MockDetector {
    pub fn new() -> Self {
        Self {
            scripted_counts: None,
        }
    }

    /// Emit exactly these person counts, cycling by frame sequence.
    /// Useful for driving known status progressions in tests.
    pub fn with_counts(counts: Vec<usize>) -> Self {
        Self {
            scripted_counts: Some(counts),
        }
    }

    fn count_for(&self, sequence: u64) -> usize {
        match &self.scripted_counts {
            Some(counts) if !counts.is_empty() => counts[(sequence as usize) % counts.len()],
            Some(_) => 0,
            None => ((sequence % 7) + 2) as usize,
        }
    }
}

impl Default for MockDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersonDetector for MockDetector {
    fn id(&self) -> &'static str {
        "mock_person_detector"
    }

    fn name(&self) -> &'static str {
        "Mock Person Detector"
    }

    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        let count = self.count_for(frame.sequence);
        let half_w = (frame.width / 2).max(1) as u64;
        let half_h = (frame.height / 2).max(1) as u64;

        let mut detections = Vec::with_capacity(count);
        for i in 0..count as u64 {
            let seed = frame.sequence.wrapping_mul(7).wrapping_add(i.wrapping_mul(13));
            detections.push(Detection {
                class: PERSON_CLASS.to_string(),
                confidence: 0.5 + ((seed % 50) as f32 / 100.0),
                bbox: BoundingBox {
                    x: (seed % half_w) as u32,
                    y: (seed % half_h) as u32,
                    width: ((seed % 80) + 20) as u32,
                    height: ((seed % 120) + 40) as u32,
                },
            });
        }

        Ok(detections)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> VideoFrame {
        VideoFrame::jpeg("test-cam", sequence, 640, 480, vec![0u8; 16])
    }

    #[tokio::test]
    async fn test_detections_are_deterministic() {
        let detector = MockDetector::new();
        let f = frame(42);

        let first = detector.detect(&f).await.unwrap();
        let second = detector.detect(&f).await.unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.bbox, b.bbox);
            assert_eq!(a.confidence, b.confidence);
        }
    }

    #[tokio::test]
    async fn test_default_count_varies_with_sequence() {
        let detector = MockDetector::new();
        for seq in 0..14 {
            let detections = detector.detect(&frame(seq)).await.unwrap();
            let expected = ((seq % 7) + 2) as usize;
            assert_eq!(detections.len(), expected);
        }
    }

    #[tokio::test]
    async fn test_scripted_counts_cycle() {
        let detector = MockDetector::with_counts(vec![5, 30, 0]);

        assert_eq!(detector.detect(&frame(0)).await.unwrap().len(), 5);
        assert_eq!(detector.detect(&frame(1)).await.unwrap().len(), 30);
        assert_eq!(detector.detect(&frame(2)).await.unwrap().len(), 0);
        assert_eq!(detector.detect(&frame(3)).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_all_detections_are_persons() {
        let detector = MockDetector::new();
        let detections = detector.detect(&frame(7)).await.unwrap();
        assert!(!detections.is_empty());
        assert!(detections.iter().all(|d| d.class == PERSON_CLASS));
        assert!(detections
            .iter()
            .all(|d| d.confidence >= 0.5 && d.confidence < 1.0));
    }

    #[tokio::test]
    async fn test_boxes_fit_frame_origin_half() {
        let detector = MockDetector::new();
        let f = frame(3);
        let detections = detector.detect(&f).await.unwrap();
        for d in detections {
            assert!(d.bbox.x < f.width / 2);
            assert!(d.bbox.y < f.height / 2);
        }
    }
}
