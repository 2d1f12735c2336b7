use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use detection::DetectError;
use serde_json::json;

pub const MODEL_NOT_LOADED: &str = "Model not loaded. Please check model path and try again.";
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Failures surfaced to HTTP clients as `{"success": false, "error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Detect(DetectError),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Detect(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Detect(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the response body. Internal details stay in the logs.
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Detect(DetectError::Decode(e)) => {
                format!("Image preprocessing failed: {e}")
            }
            ApiError::Detect(DetectError::Load(_)) => MODEL_NOT_LOADED.to_string(),
            ApiError::Detect(e @ DetectError::Inference(_)) => e.to_string(),
            ApiError::Detect(DetectError::ContractViolation(_)) | ApiError::Internal(_) => {
                INTERNAL_ERROR.to_string()
            }
        }
    }
}

impl From<DetectError> for ApiError {
    fn from(e: DetectError) -> Self {
        ApiError::Detect(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ApiError::BadRequest(msg) => tracing::warn!(error = %msg, "Rejected request"),
            ApiError::Detect(e) if e.is_client_error() => {
                tracing::warn!(error = %e, "Rejected request")
            }
            ApiError::Detect(e) => tracing::error!(error = %e, "Detection failed"),
            ApiError::Internal(msg) => tracing::error!(error = %msg, "Internal error"),
        }

        let body = Json(json!({
            "success": false,
            "error": self.message(),
        }));

        (status, body).into_response()
    }
}
