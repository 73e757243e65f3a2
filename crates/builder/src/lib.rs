//! Slipway Builder
//!
//! HTTP build service: unpacks an uploaded build context, drives the
//! external image-build engine through its streamed status protocol, and
//! returns a structured build result with the collected event log.

pub mod config;
pub mod context;
pub mod engine;
pub mod handlers;
pub mod render;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use engine::EngineClient;
pub use handlers::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_context_bytes;
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/build", post(handlers::build_handler))
        .with_state(shared_state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
