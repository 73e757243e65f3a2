//! API handlers for the builder service

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use slipway_common::{BuildLog, BuildResult, Error};

use crate::{
    config::Config,
    context::BuildContext,
    engine::{EngineClient, SolveRequest, StatusFrame},
    render,
};

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub engine: EngineClient,
}

/// Health check
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "slipway-builder"
    }))
}

/// Run one build. The response is negotiated: JSON `BuildResult` by
/// default; with `Accept: text/plain` a successful build answers with the
/// bare image reference, while failures keep the JSON shape so the body
/// stays parsable either way.
pub async fn build_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();
    info!("Build request {} ({} bytes)", request_id, body.len());

    let log = BuildLog::new();
    match execute_build(&state, &body, &log).await {
        Ok(image_name) => {
            info!("Build request {} pushed {}", request_id, image_name);
            if wants_plain_text(&headers) {
                (StatusCode::OK, image_name).into_response()
            } else {
                let result = BuildResult::success(image_name, log.snapshot());
                (StatusCode::OK, Json(result)).into_response()
            }
        }
        Err(failure) => {
            error!("Build request {} failed: {}", request_id, failure.status);
            let result = BuildResult::failure(failure.image_name, failure.status, log.snapshot());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(result)).into_response()
        }
    }
}

struct BuildFailure {
    image_name: String,
    status: String,
}

/// Unpack the context, run the solve, and collect the rendered event log.
///
/// The solve submission and the frame drain both run to completion. The
/// channel closes when the submission returns, so the drain renders every
/// frame that was queued before a failure; a terminal error frame fails
/// the build after its own events are rendered.
async fn execute_build(
    state: &AppState,
    payload: &[u8],
    log: &BuildLog,
) -> std::result::Result<String, BuildFailure> {
    let context = match BuildContext::prepare(payload, state.config.preserve_ownership) {
        Ok(context) => context,
        Err(err) => {
            return Err(BuildFailure {
                image_name: String::new(),
                status: format!("unexpected failure: {err}"),
            });
        }
    };

    let request = SolveRequest::new(
        &context.image_ref,
        &context.frontend,
        &context.context_dir(),
        state.config.insecure_registry,
    );

    let (tx, mut rx) = mpsc::channel::<StatusFrame>(64);
    let submit = state.engine.solve(&request, tx);
    let drain = async {
        let mut terminal = None;
        while let Some(frame) = rx.recv().await {
            if terminal.is_none() {
                terminal = frame.error.clone();
            }
            for line in render::render_frame(&frame) {
                log.append(line);
            }
        }
        match terminal {
            Some(message) => Err(Error::Engine(message)),
            None => Ok(()),
        }
    };

    let (submitted, drained) = tokio::join!(submit, drain);
    match drained.and(submitted) {
        Ok(()) => Ok(context.image_ref.clone()),
        Err(err) => Err(BuildFailure {
            image_name: context.image_ref.clone(),
            status: format!("failure: {err}"),
        }),
    }
}

fn wants_plain_text(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("text/plain"))
        .unwrap_or(false)
}
