use crate::backend::InferenceBackend;
use crate::error::{DetectError, LoadError};
use crate::processing::pre::ImageFrame;
use crate::types::RawDetections;
use common::span;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

/// Side of the square zero-filled frame used for warm-up.
pub const DEFAULT_WARMUP_SIZE: u32 = 640;

pub type BackendLoader<B> = Box<dyn Fn(&Path) -> anyhow::Result<B> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Unloaded => "unloaded",
            ModelStatus::Loading => "loading",
            ModelStatus::Ready => "ready",
            ModelStatus::Failed => "failed",
        }
    }
}

/// Process-wide handle to the detection model.
///
/// The backend is constructed by the first successful
/// [`ensure_ready`](Self::ensure_ready); racing callers wait for that load
/// instead of starting their own. A failed load leaves the session in
/// [`ModelStatus::Failed`] and the next call starts over.
///
/// Inference goes through a single-slot mutex: the backend needs `&mut self`,
/// so concurrent requests queue on [`infer`](Self::infer). A backend that
/// panics is discarded and the session goes back to
/// [`ModelStatus::Unloaded`], so the next request rebuilds it.
pub struct ModelSession<B: InferenceBackend> {
    model_path: PathBuf,
    warmup_size: u32,
    loader: BackendLoader<B>,
    backend: RwLock<Option<Arc<Mutex<B>>>>,
    init_lock: Mutex<()>,
    status: RwLock<ModelStatus>,
}

impl<B: InferenceBackend> ModelSession<B> {
    pub fn new<F>(model_path: impl Into<PathBuf>, warmup_size: u32, loader: F) -> Self
    where
        F: Fn(&Path) -> anyhow::Result<B> + Send + Sync + 'static,
    {
        Self {
            model_path: model_path.into(),
            warmup_size,
            loader: Box::new(loader),
            backend: RwLock::new(None),
            init_lock: Mutex::new(()),
            status: RwLock::new(ModelStatus::Unloaded),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn artifact_exists(&self) -> bool {
        self.model_path.is_file()
    }

    pub fn is_ready(&self) -> bool {
        self.loaded().is_some()
    }

    pub fn status(&self) -> ModelStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: ModelStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn loaded(&self) -> Option<Arc<Mutex<B>>> {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Load and warm the backend unless that already happened.
    ///
    /// Safe to call from many threads at once: callers racing the first load
    /// wait for it and observe its outcome instead of constructing a second
    /// backend.
    pub fn ensure_ready(&self) -> Result<(), LoadError> {
        if self.is_ready() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished loading while we waited.
        if self.is_ready() {
            return Ok(());
        }

        self.set_status(ModelStatus::Loading);

        // A panicking loader must not leave the status stuck at Loading
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.load()))
            .unwrap_or_else(|payload| {
                Err(LoadError::Construction(anyhow::anyhow!(
                    "backend construction panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        match outcome {
            Ok(backend) => {
                let mut slot = self.backend.write().unwrap_or_else(PoisonError::into_inner);
                *slot = Some(Arc::new(Mutex::new(backend)));
                self.set_status(ModelStatus::Ready);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, path = %self.model_path.display(), "Model load failed");
                self.set_status(ModelStatus::Failed);
                Err(e)
            }
        }
    }

    fn load(&self) -> Result<B, LoadError> {
        let _s = span!("load_model");

        if !self.artifact_exists() {
            return Err(LoadError::ArtifactNotFound(self.model_path.clone()));
        }

        tracing::info!(path = %self.model_path.display(), "Loading detection model");
        let start = Instant::now();
        let mut backend = (self.loader)(&self.model_path).map_err(LoadError::Construction)?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model constructed"
        );

        self.warm_up(&mut backend);

        Ok(backend)
    }

    /// Throwaway inference so the first real request does not pay for lazy
    /// allocation inside the backend. Failure here does not make the model unusable.
    fn warm_up(&self, backend: &mut B) {
        let _s = span!("warm_up_model");

        let frame = ImageFrame::blank(self.warmup_size, self.warmup_size);
        let start = Instant::now();
        match backend.infer(&frame) {
            Ok(_) => tracing::info!(
                size = self.warmup_size,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Model warmed up"
            ),
            Err(e) => tracing::warn!(error = %e, "Model warm-up failed (non-critical)"),
        }
    }

    /// Run the backend on `frame`, waiting for any in-flight inference first.
    pub fn infer(&self, frame: &ImageFrame) -> Result<RawDetections, DetectError> {
        let backend = self
            .loaded()
            .ok_or_else(|| DetectError::Inference(anyhow::anyhow!("model is not loaded")))?;

        let Ok(mut guard) = backend.lock() else {
            self.discard(&backend);
            return Err(DetectError::Inference(anyhow::anyhow!(
                "inference backend poisoned by an earlier panic"
            )));
        };

        let _s = span!("model_inference");
        match panic::catch_unwind(AssertUnwindSafe(|| guard.infer(frame))) {
            Ok(result) => result.map_err(DetectError::Inference),
            Err(payload) => {
                drop(guard);
                self.discard(&backend);
                Err(DetectError::Inference(anyhow::anyhow!(
                    "backend panicked: {}",
                    panic_message(payload.as_ref())
                )))
            }
        }
    }

    /// Drop `backend` if it is still the loaded one.
    fn discard(&self, backend: &Arc<Mutex<B>>) {
        let mut slot = self.backend.write().unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, backend))
        {
            *slot = None;
            // Under the slot lock, so a reload cannot slip in between
            self.set_status(ModelStatus::Unloaded);
            tracing::error!("Inference backend panicked, it will be rebuilt on the next request");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
