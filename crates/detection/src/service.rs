use crate::{
    backend::InferenceBackend,
    config::DetectionConfig,
    error::DetectError,
    processing::{
        post::PostProcessor,
        pre::PreProcessor,
        rescale::{CoordinateSpace, rescale},
    },
    session::ModelSession,
    types::Detection,
};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    pub processed_width: u32,
    pub processed_height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub detections: Vec<Detection>,
    /// Decode through rescale, rounded to two decimals.
    pub processing_time_ms: f64,
    pub image_size: ImageSize,
}

/// Runs the full pipeline for one uploaded image.
///
/// Holds no per-request state, so one instance serves every request; the
/// shared [`ModelSession`] is only touched through `ensure_ready` and `infer`.
pub struct DetectionService<B: InferenceBackend> {
    session: Arc<ModelSession<B>>,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
    coordinate_space: CoordinateSpace,
}

impl<B: InferenceBackend> DetectionService<B> {
    pub fn new(session: Arc<ModelSession<B>>, config: &DetectionConfig) -> Self {
        let preprocessor = PreProcessor::new(config.max_image_size);
        let postprocessor = PostProcessor::new(
            config.confidence_threshold,
            config.min_box_size,
            config.iou_threshold,
        );
        Self {
            session,
            preprocessor,
            postprocessor,
            coordinate_space: config.coordinate_space,
        }
    }

    pub fn session(&self) -> &Arc<ModelSession<B>> {
        &self.session
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.postprocessor.confidence_threshold
    }

    pub fn iou_threshold(&self) -> f32 {
        self.postprocessor.iou_threshold
    }

    pub fn max_image_size(&self) -> u32 {
        self.preprocessor.max_dimension
    }

    /// Decode, detect, filter and rescale. Blocking and CPU-bound.
    #[tracing::instrument(skip_all, fields(bytes = image_bytes.len()))]
    pub fn detect(&self, image_bytes: &[u8]) -> Result<DetectionReport, DetectError> {
        let start = Instant::now();

        let frame = self.preprocessor.preprocess(image_bytes)?;

        self.session.ensure_ready()?;

        let raw = self.session.infer(&frame)?;
        if let Err(e) = raw.validate() {
            tracing::error!(error = %e, "Discarding malformed backend output");
            return Err(e);
        }

        let filtered =
            self.postprocessor
                .filter(&raw, frame.processed_width, frame.processed_height);

        let detections = rescale(
            &filtered,
            frame.original_width,
            frame.original_height,
            frame.processed_width,
            frame.processed_height,
            self.coordinate_space,
        );

        let processing_time_ms = round_ms(start.elapsed().as_secs_f64() * 1000.0);

        tracing::info!(
            detections = detections.len(),
            processing_time_ms,
            original = %format!("{}x{}", frame.original_width, frame.original_height),
            processed = %format!("{}x{}", frame.processed_width, frame.processed_height),
            "Detection completed"
        );

        Ok(DetectionReport {
            detections,
            processing_time_ms,
            image_size: ImageSize {
                width: frame.original_width,
                height: frame.original_height,
                processed_width: frame.processed_width,
                processed_height: frame.processed_height,
            },
        })
    }
}

fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, LoadError};
    use crate::processing::pre::ImageFrame;
    use crate::types::RawDetections;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    /// Returns canned output and remembers the frame sizes it was given.
    struct ScriptedBackend {
        output: RawDetections,
        seen: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl InferenceBackend for ScriptedBackend {
        fn load_model(_path: &Path) -> anyhow::Result<Self> {
            anyhow::bail!("scripted backend is built by tests")
        }

        fn infer(&mut self, frame: &ImageFrame) -> anyhow::Result<RawDetections> {
            self.seen
                .lock()
                .unwrap()
                .push((frame.processed_width, frame.processed_height));
            Ok(self.output.clone())
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([0, 90, 160]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn service_with(
        artifact: &Path,
        output: RawDetections,
        config: DetectionConfig,
    ) -> (DetectionService<ScriptedBackend>, Arc<Mutex<Vec<(u32, u32)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_backend = seen.clone();
        let session = ModelSession::new(artifact, 16, move |_path: &Path| {
            Ok(ScriptedBackend {
                output: output.clone(),
                seen: seen_by_backend.clone(),
            })
        });
        (DetectionService::new(Arc::new(session), &config), seen)
    }

    fn fish_output() -> RawDetections {
        RawDetections::new(
            vec![
                [0.1, 0.1, 0.6, 0.6],   // fish
                [0.1, 0.1, 0.58, 0.58], // duplicate of the fish
                [0.7, 0.7, 0.95, 0.95], // low confidence
                [0.0, 0.0, 0.01, 0.01], // too small
                [0.6, 0.0, 0.9, 0.3],   // past `count`
            ],
            vec![0.92, 0.85, 0.3, 0.99, 0.99],
            vec![1, 1, 1, 1, 1],
            4,
        )
    }

    #[test]
    fn test_detect_runs_the_full_pipeline() {
        let artifact = NamedTempFile::new().unwrap();
        let (service, seen) =
            service_with(artifact.path(), fish_output(), DetectionConfig::default());

        let report = service.detect(&png(200, 100)).unwrap();

        assert_eq!(report.detections.len(), 1);
        let fish = &report.detections[0];
        assert_eq!(fish.score, 0.92);
        assert_eq!(fish.class_id, 1);
        assert_eq!(fish.bbox.to_array(), [0.1, 0.1, 0.6, 0.6]);

        assert_eq!(
            report.image_size,
            ImageSize {
                width: 200,
                height: 100,
                processed_width: 200,
                processed_height: 100,
            }
        );
        assert!(report.processing_time_ms >= 0.0);
        assert!(service.session().is_ready());

        // warm-up frame, then the request frame
        assert_eq!(*seen.lock().unwrap(), vec![(16, 16), (200, 100)]);
    }

    #[test]
    fn test_downscaled_request_reports_both_sizes_and_pixel_boxes() {
        let artifact = NamedTempFile::new().unwrap();
        let config = DetectionConfig {
            max_image_size: 100,
            coordinate_space: CoordinateSpace::Pixels,
            ..DetectionConfig::default()
        };
        let (service, seen) = service_with(artifact.path(), fish_output(), config);

        let report = service.detect(&png(400, 200)).unwrap();

        assert_eq!(report.image_size.width, 400);
        assert_eq!(report.image_size.height, 200);
        assert_eq!(report.image_size.processed_width, 100);
        assert_eq!(report.image_size.processed_height, 50);
        assert_eq!(seen.lock().unwrap().last(), Some(&(100, 50)));

        // The fish box is 50x25 processed pixels, above the 20 px minimum
        assert_eq!(report.detections.len(), 1);
        let b = report.detections[0].bbox;
        assert!((b.y1 - 20.0).abs() < 1e-3);
        assert!((b.x1 - 40.0).abs() < 1e-3);
        assert!((b.y2 - 120.0).abs() < 1e-3);
        assert!((b.x2 - 240.0).abs() < 1e-3);
    }

    #[test]
    fn test_min_box_size_is_measured_on_processed_frame() {
        let artifact = NamedTempFile::new().unwrap();
        // 0.15 of the width: 30 px on the 200 px original, 15 px once downscaled to 100
        let output = RawDetections::new(vec![[0.0, 0.0, 0.5, 0.15]], vec![0.9], vec![1], 1);
        let config = DetectionConfig {
            max_image_size: 100,
            ..DetectionConfig::default()
        };
        let (service, _) = service_with(artifact.path(), output, config);

        let report = service.detect(&png(200, 200)).unwrap();
        assert!(report.detections.is_empty());
    }

    #[test]
    fn test_undecodable_image_is_a_client_error() {
        let artifact = NamedTempFile::new().unwrap();
        let (service, seen) =
            service_with(artifact.path(), fish_output(), DetectionConfig::default());

        let err = service.detect(b"not an image").unwrap_err();
        assert!(matches!(err, DetectError::Decode(DecodeError::Image(_))));
        assert!(err.is_client_error());
        // Bad input never reaches the model
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_model_is_reported_as_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_with(
            &dir.path().join("absent.onnx"),
            fish_output(),
            DetectionConfig::default(),
        );

        let err = service.detect(&png(32, 32)).unwrap_err();
        assert!(matches!(
            err,
            DetectError::Load(LoadError::ArtifactNotFound(_))
        ));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_malformed_backend_output_is_a_contract_violation() {
        let artifact = NamedTempFile::new().unwrap();
        let output = RawDetections::new(vec![[0.0, 0.0, 1.0, 1.0]; 3], vec![0.9; 2], vec![1; 3], 3);
        let (service, _) = service_with(artifact.path(), output, DetectionConfig::default());

        let err = service.detect(&png(64, 64)).unwrap_err();
        assert!(matches!(err, DetectError::ContractViolation(_)));
    }

    #[test]
    fn test_round_ms_keeps_two_decimals() {
        assert_eq!(round_ms(12.3456), 12.35);
        assert_eq!(round_ms(0.0), 0.0);
    }
}
