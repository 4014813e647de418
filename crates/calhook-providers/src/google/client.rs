//! Google Calendar API client.
//!
//! Thin HTTP layer over the v3 REST API: the `events.watch`, `channels.stop`,
//! `events.list` and `events.get` calls. Each call is a single request; paging
//! and retries are driven by the caller.

use std::time::Duration;

use calhook_core::EventTime;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{
    BoxFuture, CalendarApi, CalendarEvent, ChangeQuery, EventPage, WatchRequest, WatchResponse,
};
use crate::error::{ProviderError, ProviderResult};

const PROVIDER_NAME: &str = "google";

/// Builds the shared reqwest client with a per-request timeout.
pub(crate) fn build_http_client(timeout: Duration, user_agent: &str) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| {
            ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                .with_provider(PROVIDER_NAME)
        })
}

/// Classifies a transport failure.
pub(crate) fn map_send_error(e: reqwest::Error, what: &str) -> ProviderError {
    let err = if e.is_timeout() {
        ProviderError::timeout(format!("{} timed out", what))
    } else if e.is_connect() {
        ProviderError::network(format!("{}: connection failed: {}", what, e))
    } else {
        ProviderError::network(format!("{} failed: {}", what, e))
    };
    err.with_provider(PROVIDER_NAME).with_source(e)
}

/// Maps a non-success status to the matching error code.
async fn status_error(response: Response, what: &str) -> ProviderError {
    let status = response.status();

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    let err = match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(format!(
            "{}: rate limit exceeded{}",
            what,
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        )),
        StatusCode::UNAUTHORIZED => {
            ProviderError::authentication(format!("{}: access token expired or invalid", what))
        }
        // Google reports quota exhaustion as 403 with a rateLimitExceeded reason.
        StatusCode::FORBIDDEN if body.contains("rateLimitExceeded") => {
            ProviderError::rate_limited(format!("{}: quota exceeded", what))
        }
        StatusCode::FORBIDDEN => ProviderError::authorization(format!("{}: access denied: {}", what, body)),
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            ProviderError::not_found(format!("{}: not found", what))
        }
        StatusCode::BAD_REQUEST => ProviderError::bad_request(format!("{}: {}", what, body)),
        s if s.is_server_error() => {
            ProviderError::server(format!("{}: API error ({}): {}", what, s, body))
        }
        s => ProviderError::invalid_response(format!("{}: unexpected status {}: {}", what, s, body)),
    };
    err.with_provider(PROVIDER_NAME)
}

/// Google Calendar API client bound to one access token.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl GoogleCalendarClient {
    /// Creates a client using the given access token.
    pub fn new(
        access_token: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        Ok(Self {
            http_client: build_http_client(timeout, user_agent)?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar_id)
        )
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> ProviderResult<T> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| map_send_error(e, what))?;

        if !response.status().is_success() {
            return Err(status_error(response, what).await);
        }

        let body = response.text().await.map_err(|e| map_send_error(e, what))?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("{}: failed to parse response: {}", what, e))
                .with_provider(PROVIDER_NAME)
        })
    }

    /// Opens a `web_hook` channel on the calendar's events.
    pub async fn watch(&self, request: &WatchRequest) -> ProviderResult<WatchResponse> {
        let url = format!("{}/watch", self.events_url(&request.calendar_id));
        let body = WatchBody {
            id: &request.channel_id,
            kind: "web_hook",
            address: &request.address,
            token: &request.token,
            params: request.ttl.map(|ttl| WatchParams {
                ttl: ttl.as_secs().to_string(),
            }),
        };

        debug!(channel_id = %request.channel_id, address = %request.address, "events.watch");
        let channel: ApiChannel = self
            .send_json(self.http_client.post(&url).json(&body), "events.watch")
            .await?;

        let expires_at = channel.expiration.as_deref().and_then(|ms| {
            let parsed = ms.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
            if parsed.is_none() {
                warn!(expiration = ms, "unparseable channel expiration");
            }
            parsed
        });

        Ok(WatchResponse {
            channel_id: channel.id,
            resource_id: channel.resource_id,
            resource_uri: channel.resource_uri,
            expires_at,
        })
    }

    /// Stops a channel.
    pub async fn stop(&self, channel_id: &str, resource_id: &str) -> ProviderResult<()> {
        let url = format!("{}/channels/stop", self.api_base);
        let body = StopBody {
            id: channel_id,
            resource_id,
        };

        debug!(channel_id, resource_id, "channels.stop");
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, "channels.stop"))?;

        if !response.status().is_success() {
            return Err(status_error(response, "channels.stop").await);
        }
        Ok(())
    }

    /// Fetches one page of events updated since `query.updated_min`.
    pub async fn list_changed(&self, query: &ChangeQuery) -> ProviderResult<EventPage> {
        let mut request = self.http_client.get(self.events_url(&query.calendar_id)).query(&[
            ("updatedMin", query.updated_min.to_rfc3339()),
            ("showDeleted", query.show_deleted.to_string()),
            ("maxResults", query.max_results.to_string()),
        ]);
        if let Some(ref token) = query.page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let list: EventListResponse = self.send_json(request, "events.list").await?;
        let items: Vec<CalendarEvent> = list.items.into_iter().filter_map(convert_event).collect();

        debug!(
            count = items.len(),
            has_more = list.next_page_token.is_some(),
            "events.list page"
        );
        Ok(EventPage {
            items,
            next_page_token: list.next_page_token,
        })
    }

    /// Fetches one event by id.
    pub async fn get(&self, calendar_id: &str, event_id: &str) -> ProviderResult<CalendarEvent> {
        let url = format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        );
        let event: ApiEvent = self.send_json(self.http_client.get(&url), "events.get").await?;
        convert_event(event).ok_or_else(|| {
            ProviderError::invalid_response("events.get: event without id").with_provider(PROVIDER_NAME)
        })
    }
}

impl CalendarApi for GoogleCalendarClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn watch_events(&self, request: WatchRequest) -> BoxFuture<'_, ProviderResult<WatchResponse>> {
        Box::pin(async move { self.watch(&request).await })
    }

    fn stop_channel<'a>(
        &'a self,
        channel_id: &'a str,
        resource_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.stop(channel_id, resource_id))
    }

    fn list_changed_events(&self, query: ChangeQuery) -> BoxFuture<'_, ProviderResult<EventPage>> {
        Box::pin(async move { self.list_changed(&query).await })
    }

    fn get_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        Box::pin(self.get(calendar_id, event_id))
    }
}

fn convert_time(time: Option<ApiEventTime>) -> Option<EventTime> {
    let time = time?;
    match (time.date_time, time.date) {
        (Some(dt), _) => DateTime::parse_from_rfc3339(&dt)
            .map_err(|e| warn!("failed to parse event time '{}': {}", dt, e))
            .ok()
            .map(EventTime::from_local),
        (None, Some(date)) => NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| warn!("failed to parse event date '{}': {}", date, e))
            .ok()
            .map(EventTime::AllDay),
        (None, None) => None,
    }
}

/// Converts an API event. Cancelled events are kept: a deletion is a change.
fn convert_event(event: ApiEvent) -> Option<CalendarEvent> {
    let id = event.id?;
    let updated = event.updated.as_deref().and_then(|u| {
        DateTime::parse_from_rfc3339(u)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| warn!(event_id = %id, "failed to parse updated '{}': {}", u, e))
            .ok()
    });

    Some(CalendarEvent {
        status: event.status,
        summary: event.summary,
        description: event.description,
        location: event.location,
        html_link: event.html_link,
        updated,
        start: convert_time(event.start),
        end: convert_time(event.end),
        organizer: event.organizer.and_then(|o| o.email),
        id,
    })
}

// API request/response types

#[derive(Debug, Serialize)]
struct WatchBody<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    address: &'a str,
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<WatchParams>,
}

#[derive(Debug, Serialize)]
struct WatchParams {
    ttl: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopBody<'a> {
    id: &'a str,
    resource_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiChannel {
    id: String,
    resource_id: String,
    #[serde(default)]
    resource_uri: Option<String>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    expiration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    html_link: Option<String>,
    updated: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    organizer: Option<ApiOrganizer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiOrganizer {
    email: Option<String>,
}
