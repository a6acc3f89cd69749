//! YOLOv8 person detection via ONNX Runtime.

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::frames::{BoundingBox, Detection, VideoFrame, PERSON_CLASS};
use image::imageops::FilterType;
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{CPUExecutionProvider, CUDAExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use std::sync::Mutex;
use std::time::Instant;
use telemetry::metrics::{DETECTOR_DETECTION_LATENCY, DETECTOR_INFERENCE_TIME};
use tracing::{debug, info, warn};

use crate::{DetectorConfig, PersonDetector};

/// ONNX Runtime backed YOLOv8 detector. The session is behind a mutex
/// because `run` takes `&mut self`.
pub struct OnnxDetector {
    config: DetectorConfig,
    session: Mutex<Session>,
    execution_provider: String,
}

impl OnnxDetector {
    /// Load the model and build an inference session.
    pub fn load(config: DetectorConfig) -> Result<Self> {
        let (session, execution_provider) = Self::build_session(&config)?;
        info!(
            model = %config.model_path,
            execution_provider = %execution_provider,
            input_size = config.input_size,
            "ONNX detector ready"
        );
        Ok(Self {
            config,
            session: Mutex::new(session),
            execution_provider,
        })
    }

    fn build_session(config: &DetectorConfig) -> Result<(Session, String)> {
        if config.use_gpu {
            let cuda_result = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(config.intra_threads)?
                .with_inter_threads(config.inter_threads)?
                .with_execution_providers([
                    CUDAExecutionProvider::default()
                        .with_device_id(config.device_id)
                        .build(),
                    CPUExecutionProvider::default().build(),
                ])?
                .commit_from_file(&config.model_path);

            match cuda_result {
                Ok(session) => return Ok((session, "cuda".to_string())),
                Err(e) => {
                    warn!("CUDA session creation failed, falling back to CPU: {}", e);
                }
            }
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .with_inter_threads(config.inter_threads)?
            .with_execution_providers([CPUExecutionProvider::default().build()])?
            .commit_from_file(&config.model_path)
            .with_context(|| format!("failed to load model from {}", config.model_path))?;

        Ok((session, "cpu".to_string()))
    }

    /// Resize to the model input square and convert to normalized NCHW.
    fn preprocess(config: &DetectorConfig, image: &image::DynamicImage) -> Array<f32, IxDyn> {
        let size = config.input_size;
        let resized = image.resize_exact(size, size, FilterType::Triangle);
        let rgb = resized.to_rgb8();

        let mut input = Array::zeros(IxDyn(&[1, 3, size as usize, size as usize]));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let x = x as usize;
            let y = y as usize;
            input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }
        input
    }

    /// Decode YOLOv8 output of shape [1, 84, N]. Row 4 is the person
    /// class score; rows 0..4 are center-x, center-y, width, height in
    /// model input coordinates.
    fn decode_predictions(
        config: &DetectorConfig,
        output: &Array<f32, IxDyn>,
        original_width: u32,
        original_height: u32,
    ) -> Vec<Detection> {
        let shape = output.shape();
        if shape.len() != 3 || shape[1] < 5 {
            warn!(?shape, "unexpected model output shape");
            return Vec::new();
        }
        let num_predictions = shape[2];

        let scale_x = original_width as f32 / config.input_size as f32;
        let scale_y = original_height as f32 / config.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..num_predictions {
            let person_score = output[[0, 4, i]];
            if person_score < config.confidence_threshold {
                continue;
            }

            let cx = output[[0, 0, i]] * scale_x;
            let cy = output[[0, 1, i]] * scale_y;
            let w = output[[0, 2, i]] * scale_x;
            let h = output[[0, 3, i]] * scale_y;

            let x = (cx - w / 2.0).max(0.0) as u32;
            let y = (cy - h / 2.0).max(0.0) as u32;

            candidates.push(Detection {
                class: PERSON_CLASS.to_string(),
                confidence: person_score,
                bbox: BoundingBox {
                    x,
                    y,
                    width: w.max(0.0) as u32,
                    height: h.max(0.0) as u32,
                },
            });
        }

        Self::nms(config, candidates)
    }

    /// Greedy non-maximum suppression, highest confidence first.
    fn nms(config: &DetectorConfig, mut candidates: Vec<Detection>) -> Vec<Detection> {
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut kept: Vec<Detection> = Vec::new();
        for candidate in candidates {
            let suppressed = kept
                .iter()
                .any(|k| iou(&k.bbox, &candidate.bbox) > config.iou_threshold);
            if !suppressed {
                kept.push(candidate);
            }
        }
        kept
    }
}

/// Intersection over union of two pixel-space boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = a.right().min(b.right());
    let y2 = a.bottom().min(b.bottom());

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = ((x2 - x1) * (y2 - y1)) as f32;
    let area_a = (a.width * a.height) as f32;
    let area_b = (b.width * b.height) as f32;
    let union = area_a + area_b - intersection;

    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[async_trait]
impl PersonDetector for OnnxDetector {
    fn id(&self) -> &'static str {
        "onnx_person_detector"
    }

    fn name(&self) -> &'static str {
        "YOLOv8 Person Detector"
    }

    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>> {
        let start = Instant::now();

        let image = image::load_from_memory(&frame.data)
            .with_context(|| format!("failed to decode frame from {}", frame.source_id))?;
        let (original_width, original_height) = (image.width(), image.height());

        let input = Self::preprocess(&self.config, &image);
        let input_tensor = Value::from_array(input)?;

        let inference_start = Instant::now();
        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("failed to lock session: {}", e))?;
        let outputs = session.run(ort::inputs![input_tensor])?;
        DETECTOR_INFERENCE_TIME
            .with_label_values(&["onnx_person_detector", &self.execution_provider])
            .observe(inference_start.elapsed().as_secs_f64());

        let output_value = outputs.get("output0").context("no output tensor found")?;
        let (shape, data) = output_value.try_extract_tensor::<f32>()?;
        let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
        let output = Array::from_shape_vec(IxDyn(&shape_usize), data.to_vec())?;
        drop(outputs);
        drop(session);

        let detections =
            Self::decode_predictions(&self.config, &output, original_width, original_height);

        DETECTOR_DETECTION_LATENCY
            .with_label_values(&["onnx_person_detector"])
            .observe(start.elapsed().as_secs_f64());
        debug!(
            source = %frame.source_id,
            sequence = frame.sequence,
            persons = detections.len(),
            "frame analyzed"
        );

        Ok(detections)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
