//! Webhook server for calendar change notifications.
//!
//! This crate wires the pieces that turn provider push notifications into
//! event log batches:
//! - [`AuthSession`] runs the OAuth authorization-code flow and hands out
//!   authorized clients
//! - [`WebhookChannelManager`] opens, renews and stops notification channels
//! - [`SyncReconciler`] fetches what changed and appends one batch per
//!   notification
//! - [`app`] / [`serve`] expose it all over HTTP with graceful shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use calhook_providers::google::{GoogleConfig, OAuthCredentials};
//! use calhook_server::{AppState, ServerConfig, SignalHandler, serve};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let google = GoogleConfig::new(
//!         OAuthCredentials::new("id.apps.googleusercontent.com", "secret"),
//!         "http://localhost:3000/callback",
//!     );
//!     let state = AppState::new(ServerConfig::default(), google)?;
//!
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!     serve(state, signals.shutdown_handle()).await?;
//!     Ok(())
//! }
//! ```

mod auth;
mod channels;
mod config;
mod error;
mod reconciler;
mod retry;
mod routes;
mod secret;
mod server;
mod signals;
mod state;
#[cfg(test)]
mod testing;
mod tunnel;

pub use auth::{AuthPhase, AuthSession, AuthorizedClient};
pub use channels::{
    Channel, ChannelFailure, UnsubscribeReport, WEBHOOK_PATH, WebhookChannelManager,
    webhook_address,
};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use reconciler::{ReconcileOutcome, ResourceState, SyncReconciler};
pub use retry::{RetryPolicy, retry_with_backoff, with_timeout};
pub use routes::{
    CHANNEL_EXPIRATION_HEADER, CHANNEL_ID_HEADER, CHANNEL_TOKEN_HEADER, MESSAGE_NUMBER_HEADER,
    RESOURCE_STATE_HEADER,
};
pub use secret::Secret;
pub use server::{app, serve};
pub use signals::{ShutdownHandle, SignalHandler};
pub use state::AppState;
pub use tunnel::{LoopbackEndpoint, PublicEndpointProvisioner, StaticEndpoint};
