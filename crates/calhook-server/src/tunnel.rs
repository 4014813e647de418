//! Public endpoint provisioning.
//!
//! The provider can only deliver notifications to a publicly reachable URL.
//! Exposing the local port (localtunnel, ngrok, a reverse proxy) happens
//! outside this process; here it is consumed as a base URL.

use calhook_providers::BoxFuture;
use tracing::warn;
use url::Url;

use crate::error::{ServerError, ServerResult};

/// Yields a publicly reachable base URL for a local port.
pub trait PublicEndpointProvisioner: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Returns the base URL (without trailing `/webhook`).
    fn public_url(&self, local_port: u16) -> BoxFuture<'_, ServerResult<String>>;
}

/// A URL fixed by configuration, e.g. an already running tunnel.
#[derive(Debug, Clone)]
pub struct StaticEndpoint {
    url: String,
}

impl StaticEndpoint {
    /// Validates and stores `url`.
    pub fn new(url: &str) -> ServerResult<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| ServerError::endpoint(format!("invalid public url '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ServerError::endpoint(format!(
                "public url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

impl PublicEndpointProvisioner for StaticEndpoint {
    fn name(&self) -> &str {
        "static"
    }

    fn public_url(&self, _local_port: u16) -> BoxFuture<'_, ServerResult<String>> {
        Box::pin(async move { Ok(self.url.clone()) })
    }
}

/// Falls back to `http://<host>:<port>`.
///
/// Only useful when the provider can reach this machine directly.
#[derive(Debug, Clone)]
pub struct LoopbackEndpoint {
    host: String,
}

impl LoopbackEndpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl Default for LoopbackEndpoint {
    fn default() -> Self {
        Self::new("localhost")
    }
}

impl PublicEndpointProvisioner for LoopbackEndpoint {
    fn name(&self) -> &str {
        "loopback"
    }

    fn public_url(&self, local_port: u16) -> BoxFuture<'_, ServerResult<String>> {
        Box::pin(async move {
            warn!(
                host = %self.host,
                port = local_port,
                "no public url configured, notifications will only arrive if the provider can reach this host"
            );
            Ok(format!("http://{}:{}", self.host, local_port))
        })
    }
}
