use super::AppState;
use crate::models::SyncSnapshot;
use axum::extract::State;
use axum::Json;

/// GET /status - current status, last successful result, last error
pub async fn status(State(state): State<AppState>) -> Json<SyncSnapshot> {
    Json(state.orchestrator.snapshot())
}
