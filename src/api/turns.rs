//! Turn-taking API endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use super::ApiState;
use crate::Error;
use crate::controller::{CompletedTurn, Status};
use crate::transcript::Turn;

/// Build the turn-taking router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/turns", post(start_turn))
        .route("/stop", post(stop))
        .route("/transcript", get(transcript))
        .route("/status", get(status))
        .with_state(state)
}

/// Run one full conversation turn
async fn start_turn(State(state): State<Arc<ApiState>>) -> Result<Json<CompletedTurn>, ApiError> {
    let completed = state.controller.start_turn().await?;
    Ok(Json(completed))
}

/// Stop spoken playback
#[allow(clippy::unused_async)]
async fn stop(State(state): State<Arc<ApiState>>) -> StatusCode {
    state.controller.stop_turn();
    StatusCode::NO_CONTENT
}

/// All turns so far, in order
#[allow(clippy::unused_async)]
async fn transcript(State(state): State<Arc<ApiState>>) -> Json<Vec<Turn>> {
    Json(state.controller.turns())
}

/// Current view status
#[allow(clippy::unused_async)]
async fn status(State(state): State<Arc<ApiState>>) -> Json<Status> {
    Json(state.controller.status())
}

/// JSON error surface for turn endpoints
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::Busy => StatusCode::CONFLICT,
            Error::CaptureTimeout | Error::Unrecognized => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };

        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
