//! Overlay rendering shared by every display surface.

use anyhow::{Context, Result};
use common::frames::{BoundingBox, Detection};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use crate::risk::{instantaneous_status, RiskStatus, RiskThresholds};

/// Header bar height in pixels.
pub const HEADER_HEIGHT: u32 = 50;

/// Height of the colored status strip at the bottom of the header.
const STATUS_STRIP_HEIGHT: u32 = 8;

/// Detection fill opacity over the original pixels.
const FILL_ALPHA: f32 = 0.4;

/// JPEG quality used for published frames when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 60;

/// Draw detection fills and the status header onto the frame in place.
///
/// Boxes are filled with the tier color of the frame's instantaneous
/// count at 40% opacity and clamped to the frame bounds. The header bar
/// is keyed to the debounced `status`.
pub fn render_overlay(
    image: &mut RgbImage,
    detections: &[Detection],
    count: usize,
    status: RiskStatus,
    thresholds: &RiskThresholds,
) {
    let box_color = instantaneous_status(count, thresholds).color();
    for detection in detections {
        fill_box(image, &detection.bbox, box_color);
    }
    draw_header(image, status);
}

fn fill_box(image: &mut RgbImage, bbox: &BoundingBox, color: [u8; 3]) {
    let x_start = bbox.x.min(image.width());
    let y_start = bbox.y.min(image.height());
    let x_end = bbox.right().min(image.width());
    let y_end = bbox.bottom().min(image.height());

    for y in y_start..y_end {
        for x in x_start..x_end {
            let pixel = image.get_pixel_mut(x, y);
            for channel in 0..3 {
                let blended = FILL_ALPHA * f32::from(color[channel])
                    + (1.0 - FILL_ALPHA) * f32::from(pixel[channel]);
                pixel[channel] = blended as u8;
            }
        }
    }
}

fn draw_header(image: &mut RgbImage, status: RiskStatus) {
    let header_bottom = HEADER_HEIGHT.min(image.height());
    for y in 0..header_bottom {
        for x in 0..image.width() {
            *image.get_pixel_mut(x, y) = Rgb([255, 255, 255]);
        }
    }

    let strip_top = header_bottom.saturating_sub(STATUS_STRIP_HEIGHT);
    let strip_color = Rgb(status.color());
    for y in strip_top..header_bottom {
        for x in 0..image.width() {
            *image.get_pixel_mut(x, y) = strip_color;
        }
    }
}

/// Encode the frame as JPEG at the given quality (0 to 100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.min(100));
    encoder
        .encode_image(image)
        .context("failed to encode frame as JPEG")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> RiskThresholds {
        RiskThresholds {
            warning_threshold: 20,
            critical_threshold: 25,
            persistence_window: 0,
            alert_cooldown_secs: 5.0,
        }
    }

    fn detection(x: u32, y: u32, width: u32, height: u32) -> Detection {
        Detection {
            class: "person".to_string(),
            confidence: 0.9,
            bbox: BoundingBox {
                x,
                y,
                width,
                height,
            },
        }
    }

    #[test]
    fn test_box_fill_blend_arithmetic() {
        let mut image = RgbImage::new(100, 100);
        // One person: instantaneous tier Normal, green fill over black
        render_overlay(
            &mut image,
            &[detection(10, 60, 20, 20)],
            1,
            RiskStatus::Normal,
            &thresholds(),
        );

        let inside = image.get_pixel(15, 65);
        assert_eq!(inside[0], 0);
        assert_eq!(inside[1], (0.4 * 255.0) as u8);
        assert_eq!(inside[2], 0);

        let outside = image.get_pixel(50, 90);
        assert_eq!(*outside, Rgb([0, 0, 0]));
    }

    #[test]
    fn test_box_clamped_at_frame_edge() {
        let mut image = RgbImage::new(64, 64);
        // Box extends past both edges; must not panic
        render_overlay(
            &mut image,
            &[detection(60, 60, 50, 50)],
            1,
            RiskStatus::Normal,
            &thresholds(),
        );
        let corner = image.get_pixel(63, 63);
        assert_eq!(corner[1], (0.4 * 255.0) as u8);
    }

    #[test]
    fn test_header_bar_dimensions() {
        let mut image = RgbImage::new(120, 200);
        render_overlay(&mut image, &[], 0, RiskStatus::Critical, &thresholds());

        // White bar above the strip
        assert_eq!(*image.get_pixel(60, 0), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(60, 41), Rgb([255, 255, 255]));
        // Status strip in the debounced tier color
        assert_eq!(*image.get_pixel(60, 45), Rgb([255, 0, 0]));
        assert_eq!(*image.get_pixel(60, 49), Rgb([255, 0, 0]));
        // Frame body untouched
        assert_eq!(*image.get_pixel(60, 50), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_header_clamped_on_small_frame() {
        let mut image = RgbImage::new(30, 20);
        render_overlay(&mut image, &[], 0, RiskStatus::Normal, &thresholds());
        assert_eq!(*image.get_pixel(10, 5), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(10, 15), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_box_color_follows_instantaneous_tier() {
        // 30 people with thresholds 20/25: instantaneous Critical, red fill
        let mut image = RgbImage::new(100, 100);
        render_overlay(
            &mut image,
            &[detection(10, 60, 10, 10)],
            30,
            RiskStatus::Warning,
            &thresholds(),
        );
        let inside = image.get_pixel(12, 62);
        assert_eq!(inside[0], (0.4 * 255.0) as u8);
        assert_eq!(inside[1], 0);
    }

    #[test]
    fn test_encode_jpeg_roundtrip() {
        let mut image = RgbImage::new(80, 60);
        for pixel in image.pixels_mut() {
            *pixel = Rgb([30, 60, 90]);
        }
        let bytes = encode_jpeg(&image, 60).unwrap();

        assert!(bytes.starts_with(&[0xFF, 0xD8]));
        assert!(bytes.ends_with(&[0xFF, 0xD9]));

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 80);
        assert_eq!(decoded.height(), 60);
    }

    #[test]
    fn test_encode_jpeg_quality_clamped() {
        let image = RgbImage::new(16, 16);
        assert!(encode_jpeg(&image, 255).is_ok());
    }
}
