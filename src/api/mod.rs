//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/mission", put(mission_handler))
        .route("/teams", post(add_team_handler))
        .route("/teams/:id", get(get_team_handler).delete(remove_team_handler))
        .route("/teams/:id/start", post(start_handler))
        .route("/teams/:id/stop", post(stop_handler))
        .route("/teams/:id/reset", post(reset_handler))
        .route("/teams/:id/thresholds", put(thresholds_handler))
        .route("/teams/:id/notes", post(note_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
