//! Maps `ManuscriptError` onto HTTP status codes for route handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use manuscript_types::ManuscriptError;
use serde_json::json;

pub struct ApiError(pub ManuscriptError);

impl From<ManuscriptError> for ApiError {
    fn from(e: ManuscriptError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ManuscriptError::NotFound(_) => StatusCode::NOT_FOUND,
            ManuscriptError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ManuscriptError::Conflict(_) => StatusCode::CONFLICT,
            ManuscriptError::CapabilityUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(error = %self.0, "request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
