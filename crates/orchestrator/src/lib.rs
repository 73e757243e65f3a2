//! Slipway Orchestrator
//!
//! Build-and-deploy pipeline service: forwards a pushed source context to
//! the builder, validates and rewrites the returned image reference,
//! upserts the function at the gateway, and reports the outcome through
//! commit statuses and audit events.

pub mod audit;
pub mod config;
pub mod deploy;
pub mod handlers;
pub mod image;
pub mod pipeline;
pub mod status;
pub mod trigger;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use handlers::AppState;
pub use pipeline::Pipeline;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_context_bytes;
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/pipeline", post(handlers::pipeline_handler))
        .with_state(shared_state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
