//! Trigger service: loopback HTTP API in front of the orchestrator.

pub mod auth;
pub mod error;
pub mod status;
pub mod sync;

use crate::executor::SyncOrchestrator;
use crate::models::Destination;
use crate::store::EntryStore;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SyncOrchestrator,
    pub store: Arc<dyn EntryStore>,
    pub destination: Destination,
    pub token: Arc<str>,
}

impl AppState {
    pub fn new(
        orchestrator: SyncOrchestrator,
        store: Arc<dyn EntryStore>,
        destination: Destination,
        token: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            orchestrator,
            store,
            destination,
            token: token.into(),
        }
    }
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status::status))
        .route("/sync", post(sync::trigger_sync))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
