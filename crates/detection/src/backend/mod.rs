use crate::processing::pre::ImageFrame;
use crate::types::RawDetections;
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Opaque object-detection model.
///
/// Implementations take `&mut self` for inference; callers share a backend
/// through [`crate::ModelSession`], which serializes calls.
pub trait InferenceBackend: Send + 'static {
    fn load_model(path: &Path) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run the model on a processed frame.
    ///
    /// Boxes are `(y1, x1, y2, x2)` normalized to the processed frame, scores lie
    /// in [0, 1], and only the first `count` entries are valid.
    fn infer(&mut self, frame: &ImageFrame) -> anyhow::Result<RawDetections>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
}

impl ExecutionProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionProvider::Cpu => "cpu",
            ExecutionProvider::Cuda => "cuda",
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => anyhow::bail!(
                "{} is not a supported execution provider. Use either `cpu` or `cuda`.",
                other
            ),
        }
    }
}
