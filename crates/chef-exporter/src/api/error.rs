//! API error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chef_exporter_core::ExporterError;
use serde::{Deserialize, Serialize};

/// JSON body returned when a handler fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable detail
    pub message: String,
}

/// Handler error carrying the status to answer with
pub struct AppError {
    pub status: StatusCode,
    pub error: ApiError,
}

impl AppError {
    /// Metrics could not be rendered
    pub fn encoding(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError {
                code: "METRICS_ENCODING_FAILED".to_string(),
                message: message.into(),
            },
        }
    }
}

impl From<ExporterError> for AppError {
    fn from(err: ExporterError) -> Self {
        tracing::error!(error = %err, "failed to encode metrics");
        Self::encoding(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}
