//! Webhook channel lifecycle.
//!
//! A channel is a provider-side subscription that POSTs to `<public url>/webhook`
//! whenever the watched calendar changes. [`WebhookChannelManager`] keeps the
//! ordered registry of open channels, checks the shared token on every inbound
//! notification, renews channels before they expire, and stops all of them at
//! shutdown.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use calhook_providers::{CalendarApi, ProviderErrorCode, WatchRequest};

use crate::error::ServerResult;
use crate::retry::with_timeout;
use crate::secret::Secret;

/// Path the provider is told to call.
pub const WEBHOOK_PATH: &str = "/webhook";

/// An open notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub channel_id: String,
    /// Provider identifier of the watched resource.
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_uri: Option<String>,
    /// Address notifications are delivered to.
    pub address: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Channel {
    /// Returns true if the channel expires before `deadline`.
    pub fn expires_before(&self, deadline: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= deadline)
    }
}

/// A channel that could not be stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFailure {
    pub channel_id: String,
    pub error: String,
}

/// Outcome of [`WebhookChannelManager::unsubscribe_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnsubscribeReport {
    pub stopped: Vec<String>,
    pub failed: Vec<ChannelFailure>,
}

impl UnsubscribeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builds the webhook address from a public base URL.
pub fn webhook_address(public_url: &str) -> String {
    format!("{}{}", public_url.trim_end_matches('/'), WEBHOOK_PATH)
}

/// Registry of open channels plus the shared webhook token.
#[derive(Debug)]
pub struct WebhookChannelManager {
    calendar_id: String,
    token: Secret,
    channels: Mutex<Vec<Channel>>,
    request_timeout: Duration,
    channel_ttl: Option<Duration>,
}

impl WebhookChannelManager {
    pub fn new(calendar_id: impl Into<String>, token: Secret, request_timeout: Duration) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            token,
            channels: Mutex::new(Vec::new()),
            request_timeout,
            channel_ttl: None,
        }
    }

    /// Builder: request a channel lifetime from the provider.
    pub fn with_channel_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.channel_ttl = ttl;
        self
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Vec<Channel>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The shared token sent with every registration.
    pub fn webhook_token(&self) -> &Secret {
        &self.token
    }

    /// Opens a channel pointing at `<public_url>/webhook` and records it.
    ///
    /// Repeated calls add further channels.
    pub async fn register_channel(
        &self,
        client: &dyn CalendarApi,
        public_url: &str,
    ) -> ServerResult<Channel> {
        let address = webhook_address(public_url);
        let channel_id = Uuid::new_v4().to_string();

        let mut request = WatchRequest::new(
            self.calendar_id.clone(),
            channel_id.clone(),
            address.clone(),
            self.token.expose(),
        );
        if let Some(ttl) = self.channel_ttl {
            request = request.with_ttl(ttl);
        }

        let response = with_timeout(
            self.request_timeout,
            "events.watch",
            client.watch_events(request),
        )
        .await?;

        let channel = Channel {
            channel_id: response.channel_id,
            resource_id: response.resource_id,
            resource_uri: response.resource_uri,
            address,
            created_at: Utc::now(),
            expires_at: response.expires_at,
        };

        info!(
            channel_id = %channel.channel_id,
            address = %channel.address,
            expires_at = ?channel.expires_at,
            "channel registered"
        );
        self.registry().push(channel.clone());
        Ok(channel)
    }

    /// Stops every channel, then registers a single new one.
    pub async fn replace_channels(
        &self,
        client: &dyn CalendarApi,
        public_url: &str,
    ) -> ServerResult<Channel> {
        let report = self.unsubscribe_all(client).await;
        if !report.is_clean() {
            warn!(failed = report.failed.len(), "some channels could not be stopped");
        }
        self.register_channel(client, public_url).await
    }

    /// Replaces every channel expiring within `lead`.
    ///
    /// The replacement is registered before the old channel is stopped so
    /// there is no window without a subscription. Returns how many channels
    /// were renewed.
    pub async fn renew_expiring(
        &self,
        client: &dyn CalendarApi,
        public_url: &str,
        lead: Duration,
    ) -> ServerResult<usize> {
        let lead = chrono::Duration::from_std(lead).unwrap_or(chrono::Duration::MAX);
        let deadline = Utc::now().checked_add_signed(lead).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let expiring: Vec<Channel> = self
            .registry()
            .iter()
            .filter(|c| c.expires_before(deadline))
            .cloned()
            .collect();

        let mut renewed = 0;
        for old in expiring {
            let new = self.register_channel(client, public_url).await?;
            debug!(old = %old.channel_id, new = %new.channel_id, "channel renewed");

            self.registry().retain(|c| c.channel_id != old.channel_id);
            if let Err(e) = with_timeout(
                self.request_timeout,
                "channels.stop",
                client.stop_channel(&old.channel_id, &old.resource_id),
            )
            .await
            {
                warn!(channel_id = %old.channel_id, error = %e, "failed to stop superseded channel");
            }
            renewed += 1;
        }

        if renewed > 0 {
            info!(renewed, "renewed expiring channels");
        }
        Ok(renewed)
    }

    /// Checks a notification's channel token in constant time.
    pub fn validate_notification(&self, token: &str) -> bool {
        self.token.matches(token)
    }

    /// Looks up a registered channel by id.
    pub fn find_channel(&self, channel_id: &str) -> Option<Channel> {
        self.registry()
            .iter()
            .find(|c| c.channel_id == channel_id)
            .cloned()
    }

    /// Snapshot of the registry in registration order.
    pub fn active_channels(&self) -> Vec<Channel> {
        self.registry().clone()
    }

    /// Stops every registered channel concurrently and empties the registry.
    ///
    /// A channel the provider no longer knows counts as stopped.
    pub async fn unsubscribe_all(&self, client: &dyn CalendarApi) -> UnsubscribeReport {
        let channels = std::mem::take(&mut *self.registry());
        if channels.is_empty() {
            return UnsubscribeReport::default();
        }

        info!(count = channels.len(), "stopping channels");
        let results = join_all(channels.iter().map(|channel| {
            with_timeout(
                self.request_timeout,
                "channels.stop",
                client.stop_channel(&channel.channel_id, &channel.resource_id),
            )
        }))
        .await;

        let mut report = UnsubscribeReport::default();
        for (channel, result) in channels.into_iter().zip(results) {
            match result {
                Ok(()) => report.stopped.push(channel.channel_id),
                Err(e) if e.code() == ProviderErrorCode::NotFound => {
                    debug!(channel_id = %channel.channel_id, "channel already gone");
                    report.stopped.push(channel.channel_id);
                }
                Err(e) => {
                    warn!(channel_id = %channel.channel_id, error = %e, "failed to stop channel");
                    report.failed.push(ChannelFailure {
                        channel_id: channel.channel_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }
}
