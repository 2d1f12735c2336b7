pub mod backend;
pub mod config;
pub mod error;
pub mod processing;
pub mod service;
pub mod session;
pub mod types;

// Re-export commonly used types for convenience
pub use backend::{ExecutionProvider, InferenceBackend};
pub use config::DetectionConfig;
pub use error::{DecodeError, DetectError, LoadError};
pub use processing::{
    post::PostProcessor,
    pre::{ImageFrame, PreProcessor},
    rescale::CoordinateSpace,
};
pub use service::{DetectionReport, DetectionService, ImageSize};
pub use session::{ModelSession, ModelStatus};
pub use types::{BoundingBox, Detection, RawDetections};
