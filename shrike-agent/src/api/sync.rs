//! Sync trigger endpoint.

use super::error::ApiError;
use super::AppState;
use crate::models::SyncResult;
use crate::utils::errors::{Result, SyncError};
use axum::extract::State;
use axum::Json;
use tracing::{info, warn};
use uuid::Uuid;

/// POST /sync - run a sync with the current entry list
pub async fn trigger_sync(State(state): State<AppState>) -> std::result::Result<Json<SyncResult>, ApiError> {
    info!("Sync requested over HTTP");
    let result = sync_now(&state).await?;
    Ok(Json(result))
}

/// Snapshot the entries, sync them, stamp `last_synced`. Shared by HTTP and CLI.
pub async fn sync_now(state: &AppState) -> Result<SyncResult> {
    let store = state.store.clone();
    let entries = tokio::task::spawn_blocking(move || store.load_entries())
        .await
        .map_err(|e| SyncError::Join(e.to_string()))??;

    let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
    let destination = state.destination.resolve();
    let result = state.orchestrator.trigger(entries, destination).await?;

    let store = state.store.clone();
    let synced_at = result.synced_at;
    match tokio::task::spawn_blocking(move || store.record_synced(&ids, synced_at)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to record last sync time: {}", e),
        Err(e) => warn!("Failed to record last sync time: {}", e),
    }

    Ok(result)
}
