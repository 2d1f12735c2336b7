use super::{ExecutionProvider, InferenceBackend};
use crate::processing::pre::ImageFrame;
use crate::types::RawDetections;
use ndarray::{ArrayViewD, Axis};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use std::path::Path;

// Tensor names of a TF Object Detection API graph exported to ONNX.
const INPUT_IMAGE: &str = "image_tensor";
const OUTPUT_BOXES: &str = "detection_boxes";
const OUTPUT_SCORES: &str = "detection_scores";
const OUTPUT_CLASSES: &str = "detection_classes";
const OUTPUT_COUNT: &str = "num_detections";

const INTRA_OP_THREADS: usize = 2;

pub struct OrtBackend {
    session: Session,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &Path,
        provider: ExecutionProvider,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(INTRA_OP_THREADS)?;

        match provider {
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;

        tracing::info!(path = %path.display(), "Model loaded");
        Ok(Self { session })
    }
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &Path) -> anyhow::Result<Self> {
        Self::load_model_with_provider(path, ExecutionProvider::Cpu)
    }

    fn infer(&mut self, frame: &ImageFrame) -> anyhow::Result<RawDetections> {
        // [1, H, W, 3] uint8, the layout the exported graph expects
        let batch = frame.pixels.view().insert_axis(Axis(0)).into_dyn();

        let outputs = self.session.run(ort::inputs![
            INPUT_IMAGE => TensorRef::from_array_view(batch)?
        ])?;

        let boxes = outputs[OUTPUT_BOXES].try_extract_array::<f32>()?;
        let scores = outputs[OUTPUT_SCORES].try_extract_array::<f32>()?;
        let classes = outputs[OUTPUT_CLASSES].try_extract_array::<f32>()?;
        let count = outputs[OUTPUT_COUNT].try_extract_array::<f32>()?;

        raw_detections_from_outputs(&boxes, &scores, &classes, &count)
    }
}

/// Flatten the batch-of-one output tensors into parallel arrays.
fn raw_detections_from_outputs(
    boxes: &ArrayViewD<f32>,   // [1, N, 4] y1 x1 y2 x2
    scores: &ArrayViewD<f32>,  // [1, N]
    classes: &ArrayViewD<f32>, // [1, N]
    count: &ArrayViewD<f32>,   // [1]
) -> anyhow::Result<RawDetections> {
    if boxes.shape().last() != Some(&4) {
        anyhow::bail!("unexpected {} shape {:?}", OUTPUT_BOXES, boxes.shape());
    }

    let flat: Vec<f32> = boxes.iter().copied().collect();
    let boxes: Vec<[f32; 4]> = flat
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect();
    let scores: Vec<f32> = scores.iter().copied().collect();
    let classes: Vec<u32> = classes.iter().map(|&c| c.max(0.0) as u32).collect();
    let count = count.iter().next().copied().unwrap_or(0.0).max(0.0) as usize;

    tracing::trace!(
        rows = boxes.len(),
        count,
        "Extracted raw detections from model outputs"
    );

    Ok(RawDetections::new(boxes, scores, classes, count))
}
