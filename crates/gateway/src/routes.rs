use crate::{
    error::ApiError,
    payload::{
        DetectRequest, DetectResponse, HealthResponse, ModelInfoResponse, decode_image_data,
    },
    state::AppState,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    routing::{get, post},
};
use detection::InferenceBackend;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn router<B: InferenceBackend>(state: AppState<B>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::<B>))
        .route("/model/info", get(model_info::<B>))
        .route("/detect", post(detect::<B>))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health<B: InferenceBackend>(State(state): State<AppState<B>>) -> Json<HealthResponse> {
    let session = state.session();
    Json(HealthResponse {
        status: "ok",
        model_loaded: session.is_ready(),
        model_path: session.model_path().display().to_string(),
        model_exists: session.artifact_exists(),
    })
}

async fn model_info<B: InferenceBackend>(
    State(state): State<AppState<B>>,
) -> Json<ModelInfoResponse> {
    let session = state.session();
    Json(ModelInfoResponse {
        model_loaded: session.is_ready(),
        model_status: session.status().as_str(),
        model_path: session.model_path().display().to_string(),
        model_exists: session.artifact_exists(),
        confidence_threshold: state.service.confidence_threshold(),
        nms_threshold: state.service.iou_threshold(),
        max_image_size: state.service.max_image_size(),
    })
}

async fn detect<B: InferenceBackend>(
    State(state): State<AppState<B>>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    state.metrics.record_request();
    let start = Instant::now();

    let result = run_detect(&state, payload).await;

    match &result {
        Ok(response) => state
            .metrics
            .record_success(start.elapsed().as_secs_f64(), response.detections.len()),
        Err(e) => state.metrics.record_failure(e.status().as_u16()),
    }

    result.map(Json)
}

async fn run_detect<B: InferenceBackend>(
    state: &AppState<B>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<DetectResponse, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Unusable request body");
        ApiError::BadRequest("No JSON data provided".to_string())
    })?;

    let image_data = request
        .image_data
        .filter(|data| !data.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No imageData provided".to_string()))?;

    let image_bytes = decode_image_data(&image_data).map_err(|e| {
        tracing::debug!(error = %e, "Base64 decoding failed");
        ApiError::BadRequest("Invalid base64 image data".to_string())
    })?;

    let service = Arc::clone(&state.service);
    let report = tokio::task::spawn_blocking(move || service.detect(&image_bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("Detection task failed: {}", e)))??;

    Ok(report.into())
}
