//! HTTP mapping for sync errors.

use crate::utils::errors::SyncError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Wraps [`SyncError`] so handlers can return it directly.
#[derive(Debug)]
pub struct ApiError(pub SyncError);

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SyncError::AuthFailure => StatusCode::UNAUTHORIZED,
            SyncError::SyncAlreadyRunning => StatusCode::CONFLICT,
            SyncError::NoEntries => StatusCode::BAD_REQUEST,
            SyncError::InvalidPaths { .. } | SyncError::DestinationNotDirectory(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SyncError::SubprocessFailure { .. } | SyncError::SubprocessTimeout { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.0 {
            // nothing beyond the verdict for unauthenticated callers
            SyncError::AuthFailure => json!({ "error": "unauthorized" }),
            SyncError::SubprocessFailure { exit_code, stderr } => json!({
                "error": self.0.kind(),
                "message": self.0.to_string(),
                "exit_code": exit_code,
                "stderr": stderr,
            }),
            SyncError::InvalidPaths { failures, .. } => json!({
                "error": self.0.kind(),
                "message": self.0.to_string(),
                "failures": failures,
            }),
            other => {
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal error: {}", other);
                }
                json!({ "error": other.kind(), "message": other.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}
