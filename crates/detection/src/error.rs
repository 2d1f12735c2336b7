use std::path::PathBuf;
use thiserror::Error;

/// Failure to bring the model session to the ready state.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Model artifact not found at {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Failed to construct inference backend: {0:#}")]
    Construction(anyhow::Error),
}

/// The uploaded bytes could not be turned into an image frame.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image data is empty")]
    Empty,

    #[error("unsupported or corrupt image: {0}")]
    Image(#[from] image::ImageError),

    #[error("image has zero width or height")]
    ZeroSized,

    #[error("resize buffer error: {0}")]
    ResizeBuffer(#[from] fast_image_resize::ImageBufferError),

    #[error("resize failed: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("pixel buffer shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Everything that can go wrong while serving one detection request.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("Backend output violates the detection contract: {0}")]
    ContractViolation(String),
}

impl DetectError {
    /// True when the request itself was malformed (HTTP 400 class).
    pub fn is_client_error(&self) -> bool {
        matches!(self, DetectError::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let err = LoadError::ArtifactNotFound(PathBuf::from("/models/fish.onnx"));
        assert_eq!(err.to_string(), "Model artifact not found at /models/fish.onnx");

        let err = LoadError::Construction(anyhow::anyhow!("malformed graph"));
        assert_eq!(
            err.to_string(),
            "Failed to construct inference backend: malformed graph"
        );

        let err = DetectError::Inference(anyhow::anyhow!("session run failed"));
        assert_eq!(err.to_string(), "Inference failed: session run failed");

        let err = DetectError::ContractViolation("3 boxes, 2 scores".to_string());
        assert_eq!(
            err.to_string(),
            "Backend output violates the detection contract: 3 boxes, 2 scores"
        );
    }

    #[test]
    fn test_load_errors_are_transparent_inside_detect_error() {
        let err: DetectError = LoadError::ArtifactNotFound(PathBuf::from("missing.onnx")).into();
        assert_eq!(err.to_string(), "Model artifact not found at missing.onnx");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_only_decode_errors_are_client_errors() {
        assert!(DetectError::from(DecodeError::Empty).is_client_error());
        assert!(DetectError::from(DecodeError::ZeroSized).is_client_error());
        assert!(!DetectError::Inference(anyhow::anyhow!("boom")).is_client_error());
        assert!(!DetectError::ContractViolation(String::new()).is_client_error());
    }
}
