//! Route table and middleware stack

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::error::panic_response;
use crate::handlers::{self, health, landing, telemetry};
use crate::state::AppState;

/// Creates the router with all routes and layers
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.body_limit_bytes;

    Router::new()
        .route("/healthz", get(health::health_check))
        .route("/", get(landing::index))
        .route("/api/telemetry", post(telemetry::ingest))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}
