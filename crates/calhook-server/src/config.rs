//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use calhook_core::SyncWindow;
use url::Url;

use crate::error::{ServerError, ServerResult};
use crate::retry::RetryPolicy;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Publicly reachable base URL (tunnel or reverse proxy).
    ///
    /// When unset the loopback address is used, which only works when the
    /// provider can reach this machine directly.
    pub public_url: Option<String>,

    /// Shared webhook token. A random one is generated per process when unset.
    pub webhook_token: Option<String>,

    /// How far before "now" the change query reaches.
    pub sync_buffer: Duration,

    /// Events requested per page.
    pub page_size: usize,

    /// Upper bound on pages followed per notification.
    pub max_pages: usize,

    /// Timeout for every outbound provider call.
    pub request_timeout: Duration,

    /// Budget for tearing channels down at shutdown.
    pub shutdown_timeout: Duration,

    /// Requested channel lifetime; `None` lets the provider choose.
    pub channel_ttl: Option<Duration>,

    /// Channels expiring within this window are renewed.
    pub renew_lead: Duration,

    /// How often the renewal task checks for expiring channels.
    pub renew_interval: Duration,

    /// JSON-lines file backing the event log; `None` keeps it in memory.
    pub events_file: Option<PathBuf>,

    /// Backoff policy for transient provider failures.
    pub retry: RetryPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            public_url: None,
            webhook_token: None,
            sync_buffer: SyncWindow::DEFAULT_BUFFER,
            page_size: 10,
            max_pages: 20,
            request_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(15),
            channel_ttl: None,
            renew_lead: Duration::from_secs(3600),
            renew_interval: Duration::from_secs(600),
            events_file: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration bound to the given port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Builder: set the bind host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Builder: set the public base URL.
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    /// Builder: set a fixed webhook token.
    pub fn with_webhook_token(mut self, token: impl Into<String>) -> Self {
        self.webhook_token = Some(token.into());
        self
    }

    /// Builder: set the sync window buffer.
    pub fn with_sync_buffer(mut self, buffer: Duration) -> Self {
        self.sync_buffer = buffer;
        self
    }

    /// Builder: set paging limits.
    pub fn with_paging(mut self, page_size: usize, max_pages: usize) -> Self {
        self.page_size = page_size;
        self.max_pages = max_pages;
        self
    }

    /// Builder: set the outbound request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder: set the shutdown teardown budget.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Builder: set channel lifetime and renewal timing.
    pub fn with_channel_renewal(
        mut self,
        ttl: Option<Duration>,
        lead: Duration,
        interval: Duration,
    ) -> Self {
        self.channel_ttl = ttl;
        self.renew_lead = lead;
        self.renew_interval = interval;
        self
    }

    /// Builder: back the event log with a file.
    pub fn with_events_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.events_file = Some(path.into());
        self
    }

    /// Builder: set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the address to bind.
    pub fn bind_addr(&self) -> ServerResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::config(format!("invalid bind address {}:{}: {}", self.host, self.port, e)))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ServerResult<()> {
        self.bind_addr()?;

        if let Some(ref public_url) = self.public_url {
            let url = Url::parse(public_url)
                .map_err(|e| ServerError::config(format!("invalid public_url '{}': {}", public_url, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ServerError::config(format!(
                    "public_url must be http or https, got '{}'",
                    url.scheme()
                )));
            }
        }
        if let Some(ref token) = self.webhook_token
            && token.is_empty()
        {
            return Err(ServerError::config("webhook_token must not be empty"));
        }
        if self.page_size == 0 || self.max_pages == 0 {
            return Err(ServerError::config("page_size and max_pages must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(ServerError::config("request_timeout must be greater than zero"));
        }
        if self.renew_interval.is_zero() {
            return Err(ServerError::config("renew_interval must be greater than zero"));
        }
        if self.sync_buffer > SyncWindow::MAX_BUFFER {
            return Err(ServerError::config(format!(
                "sync_buffer must be at most {}s, got {}s",
                SyncWindow::MAX_BUFFER.as_secs(),
                self.sync_buffer.as_secs()
            )));
        }
        Ok(())
    }
}
