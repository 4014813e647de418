//! Google Calendar integration.
//!
//! - [`OAuthClient`] builds the consent URL, exchanges authorization codes and
//!   refreshes access tokens against Google's token endpoint.
//! - [`TokenStorage`] keeps the resulting [`TokenInfo`], optionally on disk.
//! - [`GoogleCalendarClient`] is the [`CalendarApi`](crate::CalendarApi)
//!   implementation: `events.watch`, `channels.stop`, `events.list`,
//!   `events.get`.
//!
//! # Example
//!
//! ```ignore
//! use calhook_providers::google::{GoogleConfig, OAuthClient, OAuthCredentials, generate_state};
//!
//! let config = GoogleConfig::new(
//!     OAuthCredentials::new("id.apps.googleusercontent.com", "secret"),
//!     "https://hooks.example.org/callback",
//! );
//! let oauth = OAuthClient::new(
//!     config.credentials.clone(),
//!     config.endpoints.clone(),
//!     config.timeout,
//!     &config.user_agent,
//! )?;
//! let url = oauth.authorization_url(&config.redirect_uri, &config.scopes, &generate_state());
//! ```

mod client;
mod config;
mod oauth;
mod tokens;

pub use client::GoogleCalendarClient;
pub use config::{
    CALENDAR_API_BASE, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GoogleConfig, GoogleEndpoints,
    OAuthCredentials,
};
pub use oauth::{OAuthClient, RefreshedToken, generate_state};
pub use tokens::{TokenInfo, TokenStorage};
