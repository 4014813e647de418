//! HTTP surface.

mod auth;
mod channels;
mod events;
mod webhook;

use axum::Router;

use crate::state::AppState;

/// Webhook header carrying the channel token.
pub const CHANNEL_TOKEN_HEADER: &str = "x-goog-channel-token";
pub const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";
pub const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";
pub const CHANNEL_EXPIRATION_HEADER: &str = "x-goog-channel-expiration";
pub const MESSAGE_NUMBER_HEADER: &str = "x-goog-message-number";

/// Combines every route.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(webhook::router())
        .merge(events::router())
        .merge(channels::router())
}
