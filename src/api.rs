use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::checkpoint::Watermark;
use crate::engine::Poller;
use crate::error::PollError;

#[derive(Clone)]
pub struct AppState {
    pub poller: Arc<Poller>,
}

/// `/health`, `/poll` (manual cycle) and `/checkpoint`. `/metrics` is merged
/// in separately by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/poll", post(trigger_poll))
        .route("/checkpoint", get(read_checkpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct PollResp {
    forwarded: usize,
    watermark_before: Watermark,
    watermark_after: Watermark,
}

#[derive(Serialize)]
struct CheckpointResp {
    key: String,
    watermark: Watermark,
}

#[derive(Serialize)]
struct ErrorResp {
    error: &'static str,
    message: String,
}

struct ApiError(PollError);

fn status_for(e: &PollError) -> StatusCode {
    match e {
        PollError::CheckpointConflict { .. } => StatusCode::CONFLICT,
        PollError::Auth(_) | PollError::FetchRejected(_) | PollError::FetchExhausted { .. } => {
            StatusCode::BAD_GATEWAY
        }
        PollError::CheckpointRead { .. }
        | PollError::CheckpointWrite { .. }
        | PollError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResp {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}

async fn trigger_poll(State(state): State<AppState>) -> Result<Json<PollResp>, ApiError> {
    let report = state.poller.run_cycle().await.map_err(ApiError)?;
    Ok(Json(PollResp {
        forwarded: report.items.len(),
        watermark_before: report.watermark_before,
        watermark_after: report.watermark_after,
    }))
}

async fn read_checkpoint(
    State(state): State<AppState>,
) -> Result<Json<CheckpointResp>, ApiError> {
    let watermark = state.poller.watermark().await.map_err(ApiError)?;
    Ok(Json(CheckpointResp {
        key: state.poller.checkpoint_key().to_string(),
        watermark,
    }))
}
