//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calhook/config.toml` by default.
//!
//! Credential values (`client_id`, `client_secret`, `webhook_token`) support
//! secret references (`env::`, `file::`, `pass::`); see [`crate::secret`].
//! A handful of environment variables override the file: `GOOGLE_CLIENT_ID`,
//! `GOOGLE_CLIENT_SECRET`, `CALENDAR_ID`, `PUBLIC_URL` (or `NGROK_URL`) and
//! `CALHOOK_PORT`.

use std::path::PathBuf;
use std::time::Duration;

use calhook_core::{TracingConfig, TracingOutputFormat};
use calhook_providers::google::{GoogleConfig, OAuthCredentials};
use calhook_server::ServerConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// Configuration for the calhook binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub google: GoogleSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

/// Google OAuth client and calendar selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports secret references).
    pub client_id: Option<String>,

    /// OAuth client secret (supports secret references).
    pub client_secret: Option<String>,

    /// Google Cloud Console credentials JSON, used when the inline
    /// credentials are absent.
    pub credentials_file: Option<PathBuf>,

    /// Calendar to watch.
    pub calendar_id: String,

    /// OAuth redirect URI; defaults to `http://localhost:<port>/callback`.
    pub redirect_uri: Option<String>,

    /// OAuth scopes; empty means the calendar events scope.
    pub scopes: Vec<String>,

    /// Where tokens are persisted across restarts; unset keeps them in memory.
    pub token_path: Option<PathBuf>,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            credentials_file: None,
            calendar_id: GoogleConfig::DEFAULT_CALENDAR_ID.to_string(),
            redirect_uri: None,
            scopes: Vec::new(),
            token_path: None,
        }
    }
}

/// HTTP server, sync and channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,

    /// Publicly reachable base URL (tunnel).
    pub public_url: Option<String>,

    /// Shared webhook token (supports secret references). Random when unset.
    pub webhook_token: Option<String>,

    pub sync_buffer_secs: u64,
    pub page_size: usize,
    pub max_pages: usize,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,

    /// Requested channel lifetime; unset lets Google choose.
    pub channel_ttl_secs: Option<u64>,
    pub renew_lead_secs: u64,
    pub renew_interval_secs: u64,

    /// JSON-lines event log; unset keeps the log in memory.
    pub events_file: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            public_url: None,
            webhook_token: None,
            sync_buffer_secs: defaults.sync_buffer.as_secs(),
            page_size: defaults.page_size,
            max_pages: defaults.max_pages,
            request_timeout_secs: defaults.request_timeout.as_secs(),
            shutdown_timeout_secs: defaults.shutdown_timeout.as_secs(),
            channel_ttl_secs: None,
            renew_lead_secs: defaults.renew_lead.as_secs(),
            renew_interval_secs: defaults.renew_interval.as_secs(),
            events_file: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `pretty`, `compact` or `json`.
    pub format: String,
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
            level: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    /// Builds the tracing configuration; `debug` forces verbose output.
    pub fn to_tracing_config(&self, debug: bool) -> Result<TracingConfig, String> {
        if debug {
            return Ok(TracingConfig::cli_debug());
        }
        let format: TracingOutputFormat = self.format.parse()?;
        let level: Level = self
            .level
            .parse()
            .map_err(|_| format!("unknown log level '{}'", self.level))?;

        let base = match format {
            TracingOutputFormat::Json => TracingConfig::server(),
            other => TracingConfig::default().with_format(other),
        };
        Ok(base.with_level(level))
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults when absent.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calhook")
            .join("config.toml")
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(id) = get("GOOGLE_CLIENT_ID") {
            self.google.client_id = Some(id);
        }
        if let Some(secret) = get("GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = Some(secret);
        }
        if let Some(calendar) = get("CALENDAR_ID") {
            self.google.calendar_id = calendar;
        }
        if let Some(url) = get("PUBLIC_URL").or_else(|| get("NGROK_URL")) {
            self.server.public_url = Some(url);
        }
        if let Some(port) = get("CALHOOK_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| format!("CALHOOK_PORT must be a port number, got '{}'", port))?;
        }
        Ok(())
    }

    /// Builds the server configuration, resolving the webhook token.
    pub fn to_server_config(&self) -> Result<ServerConfig, String> {
        let s = &self.server;
        let mut config = ServerConfig::new(s.port)
            .with_host(&s.host)
            .with_sync_buffer(Duration::from_secs(s.sync_buffer_secs))
            .with_paging(s.page_size, s.max_pages)
            .with_request_timeout(Duration::from_secs(s.request_timeout_secs))
            .with_shutdown_timeout(Duration::from_secs(s.shutdown_timeout_secs))
            .with_channel_renewal(
                s.channel_ttl_secs.map(Duration::from_secs),
                Duration::from_secs(s.renew_lead_secs),
                Duration::from_secs(s.renew_interval_secs),
            );

        if let Some(ref url) = s.public_url {
            config = config.with_public_url(url);
        }
        if let Some(ref token) = s.webhook_token {
            let token = crate::secret::resolve(token)
                .map_err(|e| format!("failed to resolve webhook_token: {}", e))?;
            config = config.with_webhook_token(token);
        }
        if let Some(ref path) = s.events_file {
            config = config.with_events_file(path);
        }

        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }

    /// Builds the Google configuration, resolving credentials.
    pub fn to_google_config(&self) -> Result<GoogleConfig, String> {
        let google = &self.google;
        let credentials = google.resolve_credentials()?;
        let redirect_uri = google
            .redirect_uri
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}/callback", self.server.port));

        let mut config = GoogleConfig::new(credentials, redirect_uri)
            .with_calendar_id(&google.calendar_id)
            .with_timeout(Duration::from_secs(self.server.request_timeout_secs));
        if !google.scopes.is_empty() {
            config = config.with_scopes(google.scopes.clone());
        }
        if let Some(ref path) = google.token_path {
            config = config.with_token_path(path);
        }

        config.validate()?;
        Ok(config)
    }
}

impl GoogleSettings {
    /// Resolves OAuth credentials from inline fields or the credentials file.
    pub(crate) fn resolve_credentials(&self) -> Result<OAuthCredentials, String> {
        let credentials = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => {
                let id = crate::secret::resolve(id)
                    .map_err(|e| format!("failed to resolve client_id: {}", e))?;
                let secret = crate::secret::resolve(secret)
                    .map_err(|e| format!("failed to resolve client_secret: {}", e))?;
                OAuthCredentials::new(id, secret)
            }
            (Some(_), None) => {
                return Err("client_secret is missing from the [google] section".to_string());
            }
            _ => match self.credentials_file {
                Some(ref path) => OAuthCredentials::from_file(path)?,
                None => {
                    return Err(format!(
                        "Google credentials not found. Add to {}:\n  \
                         [google]\n  \
                         client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                         client_secret = \"YOUR_SECRET\"\n\n  \
                         or set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET",
                        ClientConfig::default_path().display()
                    ));
                }
            },
        };

        credentials.validate().map_err(|e| e.to_string())?;
        Ok(credentials)
    }
}
