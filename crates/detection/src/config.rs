use crate::backend::ExecutionProvider;
use crate::processing::{
    post::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD, DEFAULT_MIN_BOX_SIZE},
    pre::DEFAULT_MAX_DIMENSION,
    rescale::CoordinateSpace,
};
use crate::session::DEFAULT_WARMUP_SIZE;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Locations searched, in order, when `MODEL_PATH` is not set.
pub const DEFAULT_MODEL_PATHS: [&str; 3] = [
    "./models/fish_detection.onnx",
    "./fish_inception_v2_graph/fish_detection.onnx",
    "./backend/models/fish_detection.onnx",
];

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    pub model_path: PathBuf,
    pub execution_provider: ExecutionProvider,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub min_box_size: f32,
    pub max_image_size: u32,
    pub warmup_size: u32,
    pub coordinate_space: CoordinateSpace,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATHS[0]),
            execution_provider: ExecutionProvider::Cpu,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            min_box_size: DEFAULT_MIN_BOX_SIZE,
            max_image_size: DEFAULT_MAX_DIMENSION,
            warmup_size: DEFAULT_WARMUP_SIZE,
            coordinate_space: CoordinateSpace::Normalized,
        }
    }
}

impl DetectionConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| resolve_model_path(&DEFAULT_MODEL_PATHS));

        let config = Self {
            model_path,
            execution_provider: parse_var("EXECUTION_PROVIDER", defaults.execution_provider)?,
            confidence_threshold: parse_var("CONFIDENCE_THRESHOLD", defaults.confidence_threshold)?,
            iou_threshold: parse_var("NMS_THRESHOLD", defaults.iou_threshold)?,
            min_box_size: parse_var("MIN_BOX_SIZE", defaults.min_box_size)?,
            max_image_size: parse_var("MAX_IMAGE_SIZE", defaults.max_image_size)?,
            warmup_size: parse_var("WARMUP_SIZE", defaults.warmup_size)?,
            coordinate_space: parse_var("BBOX_FORMAT", defaults.coordinate_space)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "CONFIDENCE_THRESHOLD must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!(
                "NMS_THRESHOLD must be within [0, 1], got {}",
                self.iou_threshold
            );
        }
        if !(self.min_box_size > 0.0 && self.min_box_size.is_finite()) {
            anyhow::bail!("MIN_BOX_SIZE must be positive, got {}", self.min_box_size);
        }
        if self.max_image_size == 0 {
            anyhow::bail!("MAX_IMAGE_SIZE must be positive");
        }
        if self.warmup_size == 0 {
            anyhow::bail!("WARMUP_SIZE must be positive");
        }
        Ok(())
    }
}

/// First candidate that exists on disk, or the first candidate otherwise.
pub fn resolve_model_path<P: AsRef<Path>>(candidates: &[P]) -> PathBuf {
    candidates
        .iter()
        .map(|p| p.as_ref())
        .find(|path| path.is_file())
        .or_else(|| candidates.first().map(|p| p.as_ref()))
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Unset variables take the default; set but unparsable ones are an error.
pub fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value {:?} for {}: {}", raw, name, e)),
        Err(_) => Ok(default),
    }
}
