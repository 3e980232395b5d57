//! Bearer token check for every trigger service route.

use super::error::ApiError;
use super::AppState;
use crate::utils::errors::SyncError;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

/// Rejects the request before any handler (and any filesystem access) runs.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let authorized = matches!(provided, Some(token) if token_matches(token, &state.token));
    if !authorized {
        warn!(
            "Rejected {} {}: bad or missing bearer token",
            request.method(),
            request.uri().path()
        );
        return Err(SyncError::AuthFailure.into());
    }

    Ok(next.run(request).await)
}

/// Compare without an early exit on the first differing byte.
pub fn token_matches(provided: &str, expected: &str) -> bool {
    if expected.is_empty() || provided.len() != expected.len() {
        return false;
    }
    provided
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
