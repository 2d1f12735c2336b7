use common::{TelemetryGuard, setup_logging};
use detection::{DetectionService, LoadError, ModelSession};
use gateway::{AppState, GatewayConfig, router};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "ort-backend")]
use detection::backend::ort::OrtBackend as Backend;

#[cfg(not(feature = "ort-backend"))]
compile_error!("The gateway binary needs a backend: enable the 'ort-backend' feature");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;

    let _telemetry = match &config.otel_endpoint {
        Some(endpoint) => Some(TelemetryGuard::init(
            "gateway",
            endpoint,
            config.environment,
        )?),
        None => {
            setup_logging(config.environment);
            None
        }
    };

    log_startup(&config);

    let provider = config.detection.execution_provider;
    let session = Arc::new(ModelSession::new(
        config.detection.model_path.clone(),
        config.detection.warmup_size,
        move |path: &Path| Backend::load_model_with_provider(path, provider),
    ));

    if config.preload_model {
        let preload = Arc::clone(&session);
        match tokio::task::spawn_blocking(move || preload.ensure_ready()).await? {
            Ok(()) => tracing::info!("Model loaded and warmed up"),
            Err(e @ LoadError::ArtifactNotFound(_)) => {
                tracing::error!(error = %e, "Set MODEL_PATH to the exported ONNX model");
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Model failed to load, retrying on the next request")
            }
        }
    }

    let service = DetectionService::new(session, &config.detection);
    let app = router(AppState::new(service), config.max_body_bytes);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        endpoints = "GET /health, GET /model/info, POST /detect",
        "Gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

fn log_startup(config: &GatewayConfig) {
    let model_path = &config.detection.model_path;
    let model_size_mb = std::fs::metadata(model_path)
        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
        .ok();

    tracing::info!(
        environment = config.environment.as_str(),
        model_path = %model_path.display(),
        model_exists = model_path.is_file(),
        model_size_mb = ?model_size_mb,
        execution_provider = config.detection.execution_provider.as_str(),
        confidence_threshold = config.detection.confidence_threshold,
        nms_threshold = config.detection.iou_threshold,
        min_box_size = config.detection.min_box_size,
        max_image_size = config.detection.max_image_size,
        bbox_format = config.detection.coordinate_space.as_str(),
        port = config.port,
        "Starting fish detection gateway"
    );
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
