use crate::metrics::DetectMetrics;
use detection::{DetectionService, InferenceBackend, ModelSession};
use std::sync::Arc;

pub struct AppState<B: InferenceBackend> {
    pub service: Arc<DetectionService<B>>,
    pub metrics: DetectMetrics,
}

impl<B: InferenceBackend> AppState<B> {
    pub fn new(service: DetectionService<B>) -> Self {
        Self {
            service: Arc::new(service),
            metrics: DetectMetrics::new("gateway"),
        }
    }

    pub fn session(&self) -> &Arc<ModelSession<B>> {
        self.service.session()
    }
}

// derive(Clone) would require `B: Clone`
impl<B: InferenceBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            metrics: self.metrics.clone(),
        }
    }
}
