//! Turns webhook notifications into event log batches.
//!
//! Notifications carry no payload beyond the resource state, so each one
//! triggers a "what changed in the last few seconds" query. Every changed
//! resource is then fetched by id, enriched with the booking attribution
//! parsed from its description, and the lot is appended as one batch.

use std::sync::Arc;
use std::time::Duration;

use calhook_core::{EnrichedEvent, EventBatch, EventLog, SyncWindow, extract_booked_by};
use calhook_providers::{CalendarApi, CalendarEvent, ChangeQuery, ProviderResult};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::retry::{RetryPolicy, retry_with_backoff};

/// The `X-Goog-Resource-State` of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Handshake sent right after a channel is opened.
    Sync,
    Exists,
    NotExists,
    /// Anything else; treated like a change.
    Other(String),
}

impl ResourceState {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sync" => Self::Sync,
            "exists" => Self::Exists,
            "not_exists" => Self::NotExists,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_handshake(&self) -> bool {
        matches!(self, Self::Sync)
    }
}

/// What a notification produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Channel handshake; nothing was fetched.
    Handshake,
    /// The change query came back empty.
    NoChanges,
    /// One batch with this many events was appended.
    Appended { events: usize },
}

/// Fetches changed events and appends them to the log.
#[derive(Debug)]
pub struct SyncReconciler {
    calendar_id: String,
    log: Arc<EventLog>,
    buffer: Duration,
    page_size: usize,
    max_pages: usize,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl SyncReconciler {
    /// Creates a reconciler with default paging and a 10 second buffer.
    pub fn new(calendar_id: impl Into<String>, log: Arc<EventLog>) -> Self {
        Self::from_config(calendar_id, log, &ServerConfig::default())
    }

    /// Creates a reconciler using the server's paging, timeout and retry settings.
    pub fn from_config(
        calendar_id: impl Into<String>,
        log: Arc<EventLog>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            log,
            buffer: config.sync_buffer,
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
            request_timeout: config.request_timeout,
            retry: config.retry.clone(),
        }
    }

    /// Builder: set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder: set paging limits.
    pub fn with_paging(mut self, page_size: usize, max_pages: usize) -> Self {
        self.page_size = page_size.max(1);
        self.max_pages = max_pages.max(1);
        self
    }

    /// The log batches are appended to.
    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// Processes one notification.
    ///
    /// A failed change query aborts the notification and is returned; the
    /// next notification covers the same window again. A failed detail fetch
    /// only drops that resource.
    pub async fn handle_notification(
        &self,
        resource_state: &str,
        client: &dyn CalendarApi,
    ) -> ServerResult<ReconcileOutcome> {
        let state = ResourceState::parse(resource_state);
        if state.is_handshake() {
            debug!("channel handshake received");
            return Ok(ReconcileOutcome::Handshake);
        }

        let window = SyncWindow::ending_now(self.buffer).ok_or_else(|| {
            ServerError::config(format!(
                "sync buffer of {}s reaches outside the representable time range",
                self.buffer.as_secs()
            ))
        })?;
        debug!(lower_bound = %window.lower_bound, state = ?state, "reconciling");

        let changed = self.list_changed(client, &window).await?;
        if changed.is_empty() {
            debug!("no changes in window");
            return Ok(ReconcileOutcome::NoChanges);
        }

        let events = self.fetch_details(client, &changed).await;
        if events.is_empty() {
            warn!(listed = changed.len(), "every detail fetch failed, nothing appended");
            return Ok(ReconcileOutcome::NoChanges);
        }

        let count = events.len();
        self.log.append(EventBatch::now(events))?;
        info!(events = count, "appended event batch");
        Ok(ReconcileOutcome::Appended { events: count })
    }

    /// Collects the ids of every event updated inside the window.
    async fn list_changed(
        &self,
        client: &dyn CalendarApi,
        window: &SyncWindow,
    ) -> ProviderResult<Vec<String>> {
        let mut query = ChangeQuery::new(&self.calendar_id, window.lower_bound, self.page_size);
        let mut ids = Vec::new();

        for page_number in 1..=self.max_pages {
            let page = retry_with_backoff(&self.retry, self.request_timeout, "events.list", || {
                client.list_changed_events(query.clone())
            })
            .await?;

            ids.extend(page.items.into_iter().map(|event| event.id));
            match page.next_page_token {
                Some(token) if page_number == self.max_pages => {
                    warn!(
                        max_pages = self.max_pages,
                        next_page = %token,
                        "page limit reached, remaining changes skipped"
                    );
                }
                Some(token) => query = query.next_page(token),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn fetch_details(&self, client: &dyn CalendarApi, ids: &[String]) -> Vec<EnrichedEvent> {
        let results = join_all(ids.iter().map(|id| {
            retry_with_backoff(&self.retry, self.request_timeout, "events.get", move || {
                client.get_event(&self.calendar_id, id)
            })
        }))
        .await;

        ids.iter()
            .zip(results)
            .filter_map(|(id, result)| match result {
                Ok(event) => Some(enrich(event)),
                Err(e) => {
                    warn!(event_id = %id, error = %e, "skipping event, detail fetch failed");
                    None
                }
            })
            .collect()
    }
}

fn enrich(event: CalendarEvent) -> EnrichedEvent {
    let booked_by = extract_booked_by(event.description.as_deref());
    EnrichedEvent {
        source_id: event.id,
        status: event.status,
        summary: event.summary,
        description: event.description,
        location: event.location,
        html_link: event.html_link,
        updated: event.updated,
        start: event.start,
        end: event.end,
        organizer: event.organizer,
        booked_by,
    }
}
