//! # draftmill-api
//!
//! HTTP API server for the draftmill workflow engine: the trigger and
//! status endpoints of the trigger/poll contract, plus the assembled
//! document read with selection-based invalidation.

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use draftmill_core::{ArtifactStore, JobStore};
use draftmill_engine::JobDispatcher;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<JobDispatcher>,
    pub jobs: Arc<dyn JobStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/subjects/:subject_id/stages/:stage/trigger",
            post(handlers::trigger_stage),
        )
        .route(
            "/subjects/:subject_id/stages/:stage/status",
            get(handlers::stage_status),
        )
        .route(
            "/subjects/:subject_id/stages/:stage/document",
            get(handlers::stage_document),
        )
        .with_state(state)
}
