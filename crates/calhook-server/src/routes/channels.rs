//! Channel inspection, registration and teardown.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use crate::channels::{Channel, UnsubscribeReport};
use crate::error::ServerResult;
use crate::state::AppState;

async fn list_channels(State(state): State<AppState>) -> Json<Vec<Channel>> {
    Json(state.channels.active_channels())
}

/// Opens one more channel with the current credential.
///
/// Recovers from a callback whose registration failed after the code
/// exchange succeeded.
async fn create_channel(State(state): State<AppState>) -> ServerResult<(StatusCode, Json<Channel>)> {
    let channel = state.register_channel().await?;
    info!(channel_id = %channel.channel_id, "channel registered on request");
    Ok((StatusCode::CREATED, Json(channel)))
}

async fn stop_channels(State(state): State<AppState>) -> Json<UnsubscribeReport> {
    Json(state.unsubscribe_all().await)
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/channels",
        get(list_channels).post(create_channel).delete(stop_channels),
    )
}
