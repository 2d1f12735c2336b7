use crate::types::{BoundingBox, Detection};
use std::str::FromStr;

/// How reported boxes are expressed relative to the uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateSpace {
    /// Fractions of the original width/height, in [0, 1].
    #[default]
    Normalized,
    /// Absolute pixel coordinates in the original image.
    Pixels,
}

impl CoordinateSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinateSpace::Normalized => "normalized",
            CoordinateSpace::Pixels => "pixels",
        }
    }
}

impl FromStr for CoordinateSpace {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normalized" | "normalised" => Ok(Self::Normalized),
            "pixels" | "pixel" | "absolute" => Ok(Self::Pixels),
            other => anyhow::bail!(
                "{} is not a supported box format. Use either `normalized` or `pixels`.",
                other
            ),
        }
    }
}

/// Map detections from the processed frame back onto the original image.
///
/// Normalized coordinates do not depend on resolution, so in
/// [`CoordinateSpace::Normalized`] boxes only get clamped to [0, 1]. In
/// [`CoordinateSpace::Pixels`] each coordinate is taken to processed pixels and
/// scaled by `original / processed` per axis.
pub fn rescale(
    detections: &[Detection],
    original_width: u32,
    original_height: u32,
    processed_width: u32,
    processed_height: u32,
    space: CoordinateSpace,
) -> Vec<Detection> {
    match space {
        CoordinateSpace::Normalized => detections
            .iter()
            .map(|d| Detection {
                bbox: clamp_box(&d.bbox, 1.0, 1.0),
                ..*d
            })
            .collect(),
        CoordinateSpace::Pixels => {
            let processed_w = processed_width.max(1) as f32;
            let processed_h = processed_height.max(1) as f32;
            let scale_x = original_width as f32 / processed_w;
            let scale_y = original_height as f32 / processed_h;

            detections
                .iter()
                .map(|d| {
                    let b = &d.bbox;
                    let pixel_box = BoundingBox::new(
                        b.y1 * processed_h * scale_y,
                        b.x1 * processed_w * scale_x,
                        b.y2 * processed_h * scale_y,
                        b.x2 * processed_w * scale_x,
                    );
                    Detection {
                        bbox: clamp_box(
                            &pixel_box,
                            original_width as f32,
                            original_height as f32,
                        ),
                        ..*d
                    }
                })
                .collect()
        }
    }
}

fn clamp_box(b: &BoundingBox, max_x: f32, max_y: f32) -> BoundingBox {
    BoundingBox::new(
        b.y1.clamp(0.0, max_y),
        b.x1.clamp(0.0, max_x),
        b.y2.clamp(0.0, max_y),
        b.x2.clamp(0.0, max_x),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(y1: f32, x1: f32, y2: f32, x2: f32) -> Detection {
        Detection {
            bbox: BoundingBox::new(y1, x1, y2, x2),
            score: 0.9,
            class_id: 1,
        }
    }

    fn assert_box_close(actual: &BoundingBox, expected: [f32; 4]) {
        let actual = actual.to_array();
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-3, "expected {expected:?}, got {actual:?}");
        }
    }

    #[test]
    fn test_normalized_coordinates_survive_downscale() {
        // original 1000x500, processed 500x250
        let input = [det(0.1, 0.1, 0.5, 0.5)];
        let out = rescale(&input, 1000, 500, 500, 250, CoordinateSpace::Normalized);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bbox.to_array(), [0.1, 0.1, 0.5, 0.5]);
        assert_eq!(out[0].score, 0.9);
        assert_eq!(out[0].class_id, 1);
    }

    #[test]
    fn test_pixel_coordinates_map_to_original_geometry() {
        let input = [det(0.1, 0.1, 0.5, 0.5)];
        let out = rescale(&input, 1000, 500, 500, 250, CoordinateSpace::Pixels);

        // x spans 1000 px, y spans 500 px in the original image
        assert_box_close(&out[0].bbox, [50.0, 100.0, 250.0, 500.0]);
    }

    #[test]
    fn test_pixel_coordinates_without_resize() {
        let input = [det(0.25, 0.5, 0.75, 1.0)];
        let out = rescale(&input, 640, 480, 640, 480, CoordinateSpace::Pixels);
        assert_box_close(&out[0].bbox, [120.0, 320.0, 360.0, 640.0]);
    }

    #[test]
    fn test_pixel_coordinates_with_rounded_processed_size() {
        // 1000x333 downscaled to 500x167: rounding must not leak into the result
        let input = [det(0.0, 0.0, 1.0, 1.0)];
        let out = rescale(&input, 1000, 333, 500, 167, CoordinateSpace::Pixels);
        assert_box_close(&out[0].bbox, [0.0, 0.0, 333.0, 1000.0]);
    }

    #[test]
    fn test_boxes_are_clamped_to_the_image() {
        let input = [det(-0.1, -0.05, 1.2, 1.01)];

        let out = rescale(&input, 200, 100, 200, 100, CoordinateSpace::Normalized);
        assert_eq!(out[0].bbox.to_array(), [0.0, 0.0, 1.0, 1.0]);

        let out = rescale(&input, 200, 100, 200, 100, CoordinateSpace::Pixels);
        assert_box_close(&out[0].bbox, [0.0, 0.0, 100.0, 200.0]);
    }

    #[test]
    fn test_order_and_count_are_preserved() {
        let input = [det(0.0, 0.0, 0.2, 0.2), det(0.5, 0.5, 0.9, 0.9)];
        let out = rescale(&input, 10, 10, 5, 5, CoordinateSpace::Pixels);
        assert_eq!(out.len(), 2);
        assert!(out[0].bbox.y2 < out[1].bbox.y1);
        assert!(rescale(&[], 10, 10, 5, 5, CoordinateSpace::Pixels).is_empty());
    }

    #[test]
    fn test_coordinate_space_parsing() {
        assert_eq!(
            "normalized".parse::<CoordinateSpace>().unwrap(),
            CoordinateSpace::Normalized
        );
        assert_eq!(
            "Pixels".parse::<CoordinateSpace>().unwrap(),
            CoordinateSpace::Pixels
        );
        assert!("polar".parse::<CoordinateSpace>().is_err());
    }
}
