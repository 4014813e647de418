//! Event log routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use calhook_core::EventBatch;
use tracing::info;

use crate::error::ServerResult;
use crate::state::AppState;

/// Every batch in append order.
async fn list_events(State(state): State<AppState>) -> Json<Vec<EventBatch>> {
    Json(state.log.read_all())
}

async fn clear_events(State(state): State<AppState>) -> ServerResult<StatusCode> {
    let dropped = state.log.len();
    state.log.clear()?;
    info!(batches = dropped, "event log cleared");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(list_events).delete(clear_events))
}
