//! Shared application state.

use std::sync::Arc;

use calhook_core::EventLog;
use calhook_providers::google::GoogleConfig;
use tracing::{info, warn};

use crate::auth::AuthSession;
use crate::channels::{Channel, ChannelFailure, UnsubscribeReport, WebhookChannelManager};
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::reconciler::SyncReconciler;
use crate::secret::Secret;
use crate::tunnel::{LoopbackEndpoint, PublicEndpointProvisioner, StaticEndpoint};

/// Everything the handlers and background tasks share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub auth: Arc<AuthSession>,
    pub channels: Arc<WebhookChannelManager>,
    pub reconciler: Arc<SyncReconciler>,
    pub log: Arc<EventLog>,
    pub endpoint: Arc<dyn PublicEndpointProvisioner>,
}

impl AppState {
    /// Wires the components together from configuration.
    pub fn new(config: ServerConfig, google: GoogleConfig) -> ServerResult<Self> {
        config.validate()?;

        let log = Arc::new(match config.events_file {
            Some(ref path) => EventLog::open(path)?,
            None => EventLog::in_memory(),
        });

        let token = match config.webhook_token {
            Some(ref token) => Secret::new(token.clone()),
            None => Secret::generate(),
        };
        let calendar_id = google.calendar_id.clone();
        let channels = WebhookChannelManager::new(&calendar_id, token, config.request_timeout)
            .with_channel_ttl(config.channel_ttl);
        let reconciler = SyncReconciler::from_config(&calendar_id, Arc::clone(&log), &config);
        let auth = AuthSession::new(google, config.retry.clone())?;

        let endpoint: Arc<dyn PublicEndpointProvisioner> = match config.public_url {
            Some(ref url) => Arc::new(StaticEndpoint::new(url)?),
            None if config.host == "0.0.0.0" => Arc::new(LoopbackEndpoint::default()),
            None => Arc::new(LoopbackEndpoint::new(config.host.clone())),
        };

        Ok(Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            channels: Arc::new(channels),
            reconciler: Arc::new(reconciler),
            log,
            endpoint,
        })
    }

    /// Builder: replace the public endpoint provisioner.
    pub fn with_endpoint(mut self, endpoint: Arc<dyn PublicEndpointProvisioner>) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Resolves the public base URL for the configured port.
    pub async fn public_url(&self) -> ServerResult<String> {
        self.endpoint.public_url(self.config.port).await
    }

    /// Registers a channel at the public URL using the authorized client.
    pub async fn register_channel(&self) -> ServerResult<Channel> {
        let client = self.auth.authorized_client().await?;
        let public_url = self.public_url().await?;
        self.channels
            .register_channel(client.as_ref(), &public_url)
            .await
    }

    /// Renews channels close to expiry. Does nothing before authorization.
    pub async fn renew_channels(&self) -> ServerResult<usize> {
        if self.channels.active_channels().is_empty() || !self.auth.is_authorized() {
            return Ok(0);
        }
        let client = self.auth.authorized_client().await?;
        let public_url = self.public_url().await?;
        self.channels
            .renew_expiring(client.as_ref(), &public_url, self.config.renew_lead)
            .await
    }

    /// Stops every registered channel.
    ///
    /// Without a usable credential nothing can be stopped; the channels are
    /// reported as failed and kept.
    pub async fn unsubscribe_all(&self) -> UnsubscribeReport {
        let active = self.channels.active_channels();
        if active.is_empty() {
            return UnsubscribeReport::default();
        }

        match self.auth.authorized_client().await {
            Ok(client) => {
                let report = self.channels.unsubscribe_all(client.as_ref()).await;
                info!(
                    stopped = report.stopped.len(),
                    failed = report.failed.len(),
                    "channels unsubscribed"
                );
                report
            }
            Err(e) => {
                warn!(error = %e, channels = active.len(), "cannot stop channels without authorization");
                UnsubscribeReport {
                    stopped: Vec::new(),
                    failed: active
                        .into_iter()
                        .map(|c| ChannelFailure {
                            channel_id: c.channel_id,
                            error: e.to_string(),
                        })
                        .collect(),
                }
            }
        }
    }
}
