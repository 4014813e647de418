//! Server error types.
//!
//! [`ServerError`] is both the internal error type and the HTTP error
//! response: every variant maps to one status code.

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use calhook_core::EventLogError;
use calhook_providers::ProviderError;
use thiserror::Error;
use tracing::{error, warn};

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The OAuth callback carried a state that does not match the issued nonce.
    #[error("Invalid state")]
    InvalidState,

    /// The authorization code could not be exchanged for tokens.
    #[error("Authorization failed: {0}")]
    AuthExchange(#[source] ProviderError),

    /// No successful authorization has happened yet.
    #[error("Not authorized")]
    NotAuthorized,

    /// The access token expired and could not be refreshed.
    #[error("Authorization expired: {0}")]
    AuthExpired(#[source] ProviderError),

    /// A webhook call carried the wrong channel token.
    #[error("Invalid webhook token")]
    InvalidWebhookToken,

    /// A call to the calendar provider failed.
    #[error("Provider request failed: {0}")]
    Provider(#[from] ProviderError),

    /// The public endpoint could not be provisioned.
    #[error("Public endpoint unavailable: {message}")]
    Endpoint { message: String },

    /// The event log could not be written.
    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// IO error (listener, file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an endpoint provisioning error.
    pub fn endpoint(message: impl Into<String>) -> Self {
        Self::Endpoint {
            message: message.into(),
        }
    }

    /// Returns the HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidState | Self::InvalidWebhookToken => StatusCode::FORBIDDEN,
            Self::AuthExchange(_) => StatusCode::BAD_REQUEST,
            Self::NotAuthorized | Self::AuthExpired(_) => StatusCode::UNAUTHORIZED,
            Self::Provider(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Self::Provider(_) | Self::Endpoint { .. } => StatusCode::BAD_GATEWAY,
            Self::EventLog(_) | Self::Io(_) | Self::Config { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), "{}", self);
        } else {
            warn!(status = status.as_u16(), "{}", self);
        }

        (status, self.to_string()).into_response()
    }
}
