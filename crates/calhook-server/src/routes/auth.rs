//! Authorization routes: landing page, consent redirect, OAuth callback.

use axum::Router;
use axum::extract::{Query, State};
use axum::response::{Html, Redirect};
use axum::routing::get;
use calhook_providers::ProviderError;
use serde::Deserialize;
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let channels = state.channels.active_channels().len();
    Html(format!(
        "<!doctype html>\n<html><head><title>calhook</title></head><body>\n\
         <h1>calhook</h1>\n\
         <p>Status: {}. Active channels: {}.</p>\n\
         <p><a href=\"/redirect\">Authorize with Google Calendar</a></p>\n\
         </body></html>\n",
        state.auth.phase().as_str(),
        channels
    ))
}

async fn redirect(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.auth.start_authorization())
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ServerResult<String> {
    let received = params.state.as_deref().unwrap_or_default();
    if !state.auth.validate_callback(received) {
        return Err(ServerError::InvalidState);
    }

    if let Some(error) = params.error {
        return Err(ServerError::AuthExchange(
            ProviderError::authorization(format!("consent denied: {}", error))
                .with_provider("google"),
        ));
    }
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return Err(ServerError::AuthExchange(ProviderError::bad_request(
            "callback carried no authorization code",
        )));
    };

    state.auth.complete_authorization(&code).await?;
    let channel = state.register_channel().await?;
    info!(channel_id = %channel.channel_id, "watching calendar");

    Ok(format!(
        "Authorization complete. Watching calendar '{}' on channel {}.\n",
        state.auth.calendar_id(),
        channel.channel_id
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/redirect", get(redirect))
        .route("/callback", get(callback))
}
