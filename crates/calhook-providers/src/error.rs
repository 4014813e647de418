//! Error types for calendar provider operations.
//!
//! Every outbound call to the provider (token endpoint, watch, stop, list,
//! get) fails with a [`ProviderError`]. The [`ProviderErrorCode`] drives the
//! retry decision and the HTTP status the server maps the failure to.

use std::fmt;
use thiserror::Error;

/// What went wrong, independent of which endpoint was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// 401, or the token endpoint rejected the code / refresh token.
    AuthenticationFailed,
    /// 403 other than a quota error: the grant does not cover the calendar.
    AuthorizationFailed,
    /// The request never got an HTTP response.
    NetworkError,
    /// No response within the request timeout.
    Timeout,
    /// 429, or 403 with a `rateLimitExceeded` reason.
    RateLimited,
    /// 5xx.
    ServerError,
    /// A 2xx body that could not be decoded.
    InvalidResponse,
    /// 404 or 410; a stopped channel or a purged event.
    NotFound,
    /// 400.
    BadRequest,
    ConfigurationError,
    InternalError,
}

impl ProviderErrorCode {
    /// Transient failures worth another attempt with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::RateLimited | Self::ServerError
        )
    }

    /// Snake-case name used in log fields and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed call to the calendar provider or its token endpoint.
///
/// Displayed as `[google] rate_limited: events.list failed (429 ...)`.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// Which backend answered, when known.
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Timeout, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BadRequest, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Tags the error with the backend name shown in `Display`.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true if the call ran out of time.
    pub fn is_timeout(&self) -> bool {
        self.code == ProviderErrorCode::Timeout
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Result of any provider call.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_are_retryable() {
        assert!(ProviderErrorCode::NetworkError.is_retryable());
        assert!(ProviderErrorCode::Timeout.is_retryable());
        assert!(ProviderErrorCode::RateLimited.is_retryable());
        assert!(ProviderErrorCode::ServerError.is_retryable());
        assert!(!ProviderErrorCode::AuthenticationFailed.is_retryable());
        assert!(!ProviderErrorCode::NotFound.is_retryable());
        assert!(!ProviderErrorCode::BadRequest.is_retryable());
    }

    #[test]
    fn timeout_is_distinguishable() {
        let err = ProviderError::timeout("watch request exceeded 10s");
        assert!(err.is_timeout());
        assert_eq!(err.code().as_str(), "timeout");
        assert!(!ProviderError::network("reset").is_timeout());
    }

    #[test]
    fn display_names_backend_and_code() {
        let err = ProviderError::rate_limited("too many requests").with_provider("google");
        assert_eq!(err.provider(), Some("google"));
        let display = err.to_string();
        assert!(display.contains("[google]"));
        assert!(display.contains("rate_limited"));
        assert!(display.contains("too many requests"));
    }

    #[test]
    fn keeps_source_chain() {
        use std::error::Error;
        let io_err = std::io::Error::other("disk full");
        let err = ProviderError::internal("failed to persist tokens").with_source(io_err);
        assert!(err.source().is_some());
        assert_eq!(err.message(), "failed to persist tokens");
    }
}
