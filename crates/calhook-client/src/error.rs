//! Client error types.

use calhook_core::TracingError;
use calhook_server::ServerError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that end the `calhook` process with a non-zero exit.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("logging setup failed: {0}")]
    Tracing(#[from] TracingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
