use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use detection::{Detection, DetectionReport, ImageSize};
use serde::{Deserialize, Serialize};

/// Standard alphabet, padding optional.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    #[serde(rename = "imageData")]
    pub image_data: Option<String>,
}

/// Decode a raw base64 string or a `data:<mime>;base64,<payload>` URL.
///
/// Everything up to and including the first comma is dropped and ASCII
/// whitespace (line-wrapped payloads) is ignored.
pub fn decode_image_data(image_data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match image_data.split_once(',') {
        Some((_, payload)) => payload,
        None => image_data,
    };

    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    BASE64.decode(compact)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_path: String,
    pub model_exists: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_loaded: bool,
    /// `unloaded`, `loading`, `ready` or `failed`
    pub model_status: &'static str,
    pub model_path: String,
    pub model_exists: bool,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub max_image_size: u32,
}

#[derive(Debug, Serialize)]
pub struct DetectionDto {
    /// `[y1, x1, y2, x2]`
    pub bbox: [f32; 4],
    pub score: f32,
    pub class: u32,
}

impl From<&Detection> for DetectionDto {
    fn from(d: &Detection) -> Self {
        Self {
            bbox: d.bbox.to_array(),
            score: d.score,
            class: d.class_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageSizeDto {
    pub width: u32,
    pub height: u32,
    pub processed_width: u32,
    pub processed_height: u32,
}

impl From<ImageSize> for ImageSizeDto {
    fn from(size: ImageSize) -> Self {
        Self {
            width: size.width,
            height: size.height,
            processed_width: size.processed_width,
            processed_height: size.processed_height,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    pub detections: Vec<DetectionDto>,
    pub processing_time_ms: f64,
    pub image_size: ImageSizeDto,
}

impl From<DetectionReport> for DetectResponse {
    fn from(report: DetectionReport) -> Self {
        Self {
            success: true,
            detections: report.detections.iter().map(DetectionDto::from).collect(),
            processing_time_ms: report.processing_time_ms,
            image_size: report.image_size.into(),
        }
    }
}
