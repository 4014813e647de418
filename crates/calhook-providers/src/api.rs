//! The [`CalendarApi`] capability trait.
//!
//! An authorized connection to the calendar provider, reduced to the four
//! calls the push-notification flow needs:
//!
//! - open a watch channel on a calendar's events
//! - stop a channel
//! - list events changed since an instant (one page at a time)
//! - fetch one event by id
//!
//! Holders of a [`CalendarApi`] never see the underlying tokens.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use calhook_core::EventTime;
use chrono::{DateTime, Utc};

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Boxing keeps the trait object-safe so an authorized client can be passed
/// around as `Arc<dyn CalendarApi>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Parameters for opening a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
    /// Calendar whose events are watched.
    pub calendar_id: String,
    /// Caller-chosen unique channel id.
    pub channel_id: String,
    /// HTTPS address the provider will POST notifications to.
    pub address: String,
    /// Shared secret echoed back in every notification.
    pub token: String,
    /// Requested channel lifetime; the provider may grant less.
    pub ttl: Option<Duration>,
}

impl WatchRequest {
    pub fn new(
        calendar_id: impl Into<String>,
        channel_id: impl Into<String>,
        address: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            channel_id: channel_id.into(),
            address: address.into(),
            token: token.into(),
            ttl: None,
        }
    }

    /// Builder method to request a channel lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// The provider's answer to a watch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchResponse {
    pub channel_id: String,
    /// Provider-side identifier of the watched resource, needed to stop the channel.
    pub resource_id: String,
    pub resource_uri: Option<String>,
    /// When the provider will stop delivering notifications.
    pub expires_at: Option<DateTime<Utc>>,
}

/// One page of an "events changed since" query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeQuery {
    pub calendar_id: String,
    /// Only events updated at or after this instant are returned.
    pub updated_min: DateTime<Utc>,
    /// Include cancelled (deleted) events.
    pub show_deleted: bool,
    /// Page size.
    pub max_results: usize,
    /// Continuation token from the previous page.
    pub page_token: Option<String>,
}

impl ChangeQuery {
    /// Creates a query for the first page, including deleted events.
    pub fn new(calendar_id: impl Into<String>, updated_min: DateTime<Utc>, max_results: usize) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            updated_min,
            show_deleted: true,
            max_results,
            page_token: None,
        }
    }

    /// Returns the query for the page following `token`.
    pub fn next_page(&self, token: impl Into<String>) -> Self {
        Self {
            page_token: Some(token.into()),
            ..self.clone()
        }
    }
}

/// A calendar event as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub html_link: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    /// Organizer email.
    pub organizer: Option<String>,
}

impl CalendarEvent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// One page of changed events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPage {
    pub items: Vec<CalendarEvent>,
    pub next_page_token: Option<String>,
}

impl EventPage {
    /// Creates a final page (no continuation).
    pub fn last(items: Vec<CalendarEvent>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }

    /// Builder method to set the continuation token.
    pub fn with_next_page_token(mut self, token: impl Into<String>) -> Self {
        self.next_page_token = Some(token.into());
        self
    }
}

/// An authorized connection to the calendar provider.
///
/// # Implementing
///
/// ```ignore
/// impl CalendarApi for MyApi {
///     fn name(&self) -> &str { "my-api" }
///
///     fn get_event<'a>(&'a self, calendar_id: &'a str, event_id: &'a str)
///         -> BoxFuture<'a, ProviderResult<CalendarEvent>>
///     {
///         Box::pin(async move { self.fetch(calendar_id, event_id).await })
///     }
///     // ...
/// }
/// ```
pub trait CalendarApi: Send + Sync {
    /// Returns the provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Opens a push-notification channel on a calendar's events.
    fn watch_events(&self, request: WatchRequest) -> BoxFuture<'_, ProviderResult<WatchResponse>>;

    /// Stops a channel so the provider no longer calls the webhook.
    fn stop_channel<'a>(
        &'a self,
        channel_id: &'a str,
        resource_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Lists one page of events changed since `query.updated_min`.
    fn list_changed_events(&self, query: ChangeQuery) -> BoxFuture<'_, ProviderResult<EventPage>>;

    /// Fetches the full detail of one event.
    fn get_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>>;
}
