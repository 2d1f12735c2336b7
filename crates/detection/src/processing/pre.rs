use crate::error::DecodeError;
use common::span;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use ndarray::Array3;

pub const DEFAULT_MAX_DIMENSION: u32 = 1280;

/// Decoded RGB image ready for inference, with the geometry needed to map
/// detections back onto the uploaded image.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    /// H x W x 3, RGB
    pub pixels: Array3<u8>,
    pub original_width: u32,
    pub original_height: u32,
    pub processed_width: u32,
    pub processed_height: u32,
}

impl ImageFrame {
    /// Zero-filled frame, used to warm the backend up.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixels: Array3::zeros((height as usize, width as usize, 3)),
            original_width: width,
            original_height: height,
            processed_width: width,
            processed_height: height,
        }
    }

    pub fn was_resized(&self) -> bool {
        self.original_width != self.processed_width
            || self.original_height != self.processed_height
    }
}

pub struct PreProcessor {
    pub max_dimension: u32,
}

impl PreProcessor {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    /// Decode `raw_bytes`, drop any alpha channel and bound the longest side to
    /// `max_dimension` while keeping the aspect ratio.
    pub fn preprocess(&self, raw_bytes: &[u8]) -> Result<ImageFrame, DecodeError> {
        let _s = span!("preprocess_image");

        if raw_bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let decoded = image::load_from_memory(raw_bytes)?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        if width == 0 || height == 0 {
            return Err(DecodeError::ZeroSized);
        }

        let (new_width, new_height) = target_dimensions(width, height, self.max_dimension);

        let buffer = if (new_width, new_height) == (width, height) {
            rgb.into_raw()
        } else {
            tracing::debug!(
                width,
                height,
                new_width,
                new_height,
                "Downscaling image for processing"
            );
            Self::resize(rgb.into_raw(), width, height, new_width, new_height)?
        };

        let pixels = Array3::from_shape_vec((new_height as usize, new_width as usize, 3), buffer)?;

        Ok(ImageFrame {
            pixels,
            original_width: width,
            original_height: height,
            processed_width: new_width,
            processed_height: new_height,
        })
    }

    fn resize(
        buffer: Vec<u8>,
        width: u32,
        height: u32,
        new_width: u32,
        new_height: u32,
    ) -> Result<Vec<u8>, DecodeError> {
        let _s = span!("resize_image");

        let src = Image::from_vec_u8(width, height, buffer, PixelType::U8x3)?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3)),
        )?;

        Ok(resized.into_vec())
    }
}

impl Default for PreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

/// Convenience wrapper around [`PreProcessor::preprocess`].
pub fn preprocess(raw_bytes: &[u8], max_dimension: u32) -> Result<ImageFrame, DecodeError> {
    PreProcessor::new(max_dimension).preprocess(raw_bytes)
}

/// Dimensions after bounding the longest side to `max_dimension`.
///
/// Images already within bounds are returned unchanged; otherwise both sides
/// are scaled by `max_dimension / longest` and rounded to the nearest pixel.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }

    let scale = max_dimension as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}
