//! Google Calendar configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Google's OAuth authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// OAuth 2.0 client identity registered with Google.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
}

/// Structure of Google's OAuth credentials JSON file.
///
/// Accepts the Cloud Console download (`installed` or `web` section) and the
/// flat `{client_id, client_secret}` form.
#[derive(Debug, Deserialize)]
struct GoogleCredentialsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads credentials from a Google Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("failed to read credentials file: {}", e))?;
        Self::from_json(&content)
    }

    /// Parses credentials from a Google credentials JSON string.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: GoogleCredentialsFile = serde_json::from_str(json)
            .map_err(|e| format!("failed to parse credentials JSON: {}", e))?;

        if let Some(creds) = file.installed.or(file.web) {
            return Ok(Self::new(creds.client_id, creds.client_secret));
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err("credentials file must contain 'installed'/'web' section or 'client_id'/'client_secret' at root level".to_string())
    }

    /// Checks that the credentials look like a Google OAuth client.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Endpoint URLs used to talk to Google.
///
/// Overridable so tests can point the clients at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_base: CALENDAR_API_BASE.to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// Routes every endpoint to `base` (`{base}/auth`, `{base}/token`, `{base}/calendar/v3`).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{}/auth", base),
            token_url: format!("{}/token", base),
            api_base: format!("{}/calendar/v3", base),
        }
    }
}

/// Configuration for the Google side of the integration.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client identity.
    pub credentials: OAuthCredentials,

    /// Where Google sends the operator back after consent.
    ///
    /// Must match a redirect URI registered for the OAuth client.
    pub redirect_uri: String,

    /// Calendar whose events are watched. Defaults to `"primary"`.
    pub calendar_id: String,

    /// OAuth scopes to request.
    ///
    /// Defaults to `["https://www.googleapis.com/auth/calendar.events"]`.
    pub scopes: Vec<String>,

    /// Per-request timeout for every HTTP call.
    pub timeout: Duration,

    /// User agent string for API requests.
    pub user_agent: String,

    /// File the token set is persisted to. `None` keeps tokens in memory only.
    pub token_path: Option<PathBuf>,

    pub endpoints: GoogleEndpoints,
}

impl GoogleConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    /// Default OAuth scope: read/write access to calendar events.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.events";

    /// Default calendar id.
    pub const DEFAULT_CALENDAR_ID: &'static str = "primary";

    pub fn new(credentials: OAuthCredentials, redirect_uri: impl Into<String>) -> Self {
        Self {
            credentials,
            redirect_uri: redirect_uri.into(),
            calendar_id: Self::DEFAULT_CALENDAR_ID.to_string(),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calhook/{}", env!("CARGO_PKG_VERSION")),
            token_path: None,
            endpoints: GoogleEndpoints::default(),
        }
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Persists tokens to `path`.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.credentials.validate().map_err(str::to_string)?;

        let redirect = Url::parse(&self.redirect_uri)
            .map_err(|e| format!("invalid redirect_uri '{}': {}", self.redirect_uri, e))?;
        if !matches!(redirect.scheme(), "http" | "https") {
            return Err(format!(
                "redirect_uri must be http or https, got '{}'",
                redirect.scheme()
            ));
        }

        if self.calendar_id.trim().is_empty() {
            return Err("calendar_id is required".to_string());
        }
        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
