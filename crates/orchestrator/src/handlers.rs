//! API handlers for the orchestrator

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::trigger::TriggerEvent;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub pipeline: Pipeline,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<slipway_common::Error> for ApiError {
    fn from(err: slipway_common::Error) -> Self {
        let status = match err {
            slipway_common::Error::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

/// Health check
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "slipway-orchestrator"
    }))
}

/// Run the build-and-deploy pipeline for one pushed revision. The body is
/// the tar context for the builder; everything else rides in headers.
pub async fn pipeline_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<String, ApiError> {
    let event = TriggerEvent::from_headers(&headers)?;
    info!(
        "Pipeline trigger for {}/{} ({}) at {}",
        event.owner, event.repository, event.service, event.sha
    );

    let summary = state.pipeline.run(&event, payload).await?;
    Ok(summary)
}
