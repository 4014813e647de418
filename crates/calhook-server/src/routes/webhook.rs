//! Provider push notifications.

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use tracing::{debug, error, info, warn};

use super::{
    CHANNEL_EXPIRATION_HEADER, CHANNEL_ID_HEADER, CHANNEL_TOKEN_HEADER, MESSAGE_NUMBER_HEADER,
    RESOURCE_STATE_HEADER,
};
use crate::error::{ServerError, ServerResult};
use crate::reconciler::ReconcileOutcome;
use crate::state::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Validates the channel token, then reconciles.
///
/// Once the token is accepted the provider always gets a 200; a failed
/// reconcile is logged and the next notification covers the window again.
async fn notification(State(state): State<AppState>, headers: HeaderMap) -> ServerResult<StatusCode> {
    let token = header(&headers, CHANNEL_TOKEN_HEADER).unwrap_or_default();
    if !state.channels.validate_notification(token) {
        return Err(ServerError::InvalidWebhookToken);
    }

    let resource_state = header(&headers, RESOURCE_STATE_HEADER).unwrap_or_default();
    let channel_id = header(&headers, CHANNEL_ID_HEADER).unwrap_or_default();
    debug!(
        channel_id,
        resource_state,
        message_number = header(&headers, MESSAGE_NUMBER_HEADER),
        expiration = header(&headers, CHANNEL_EXPIRATION_HEADER),
        "notification received"
    );
    if !channel_id.is_empty() && state.channels.find_channel(channel_id).is_none() {
        debug!(channel_id, "notification from a channel not in the registry");
    }

    let client = match state.auth.authorized_client().await {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "notification dropped, no usable credential");
            return Ok(StatusCode::OK);
        }
    };

    match state
        .reconciler
        .handle_notification(resource_state, client.as_ref())
        .await
    {
        Ok(ReconcileOutcome::Appended { events }) => {
            info!(channel_id, events, "notification reconciled");
        }
        Ok(outcome) => debug!(channel_id, ?outcome, "notification reconciled"),
        Err(e) => error!(channel_id, error = %e, "reconcile failed"),
    }
    Ok(StatusCode::OK)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(notification))
}
