//! In-memory [`CalendarApi`] for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use calhook_providers::{
    BoxFuture, CalendarApi, CalendarEvent, ChangeQuery, EventPage, ProviderError, ProviderResult,
    WatchRequest, WatchResponse,
};
use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
struct Recorded {
    watches: Vec<WatchRequest>,
    stops: Vec<(String, String)>,
    lists: Vec<ChangeQuery>,
    gets: Vec<String>,
}

/// Records every call and answers from canned data.
#[derive(Debug, Default)]
pub struct FakeCalendar {
    recorded: Mutex<Recorded>,
    pages: Mutex<VecDeque<ProviderResult<EventPage>>>,
    events: Mutex<HashMap<String, CalendarEvent>>,
    failing_gets: Mutex<HashSet<String>>,
    failing_stops: Mutex<HashSet<String>>,
    watch_expiry: Mutex<Option<DateTime<Utc>>>,
}

impl FakeCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a page returned by the next list call. With no queued page the
    /// list is empty.
    pub fn push_page(&self, page: ProviderResult<EventPage>) {
        self.pages.lock().unwrap().push_back(page);
    }

    /// Registers detail data for `get_event`.
    pub fn add_event(&self, event: CalendarEvent) {
        self.events.lock().unwrap().insert(event.id.clone(), event);
    }

    pub fn fail_get(&self, id: &str) {
        self.failing_gets.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_stop(&self, channel_id: &str) {
        self.failing_stops.lock().unwrap().insert(channel_id.to_string());
    }

    pub fn set_watch_expiry(&self, at: DateTime<Utc>) {
        *self.watch_expiry.lock().unwrap() = Some(at);
    }

    pub fn watches(&self) -> Vec<WatchRequest> {
        self.recorded.lock().unwrap().watches.clone()
    }

    pub fn stops(&self) -> Vec<(String, String)> {
        self.recorded.lock().unwrap().stops.clone()
    }

    pub fn lists(&self) -> Vec<ChangeQuery> {
        self.recorded.lock().unwrap().lists.clone()
    }

    pub fn gets(&self) -> Vec<String> {
        self.recorded.lock().unwrap().gets.clone()
    }

    pub fn total_calls(&self) -> usize {
        let r = self.recorded.lock().unwrap();
        r.watches.len() + r.stops.len() + r.lists.len() + r.gets.len()
    }
}

impl CalendarApi for FakeCalendar {
    fn name(&self) -> &str {
        "fake"
    }

    fn watch_events(&self, request: WatchRequest) -> BoxFuture<'_, ProviderResult<WatchResponse>> {
        Box::pin(async move {
            let response = WatchResponse {
                channel_id: request.channel_id.clone(),
                resource_id: format!("res-{}", request.channel_id),
                resource_uri: None,
                expires_at: *self.watch_expiry.lock().unwrap(),
            };
            self.recorded.lock().unwrap().watches.push(request);
            Ok(response)
        })
    }

    fn stop_channel<'a>(
        &'a self,
        channel_id: &'a str,
        resource_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            self.recorded
                .lock()
                .unwrap()
                .stops
                .push((channel_id.to_string(), resource_id.to_string()));
            if self.failing_stops.lock().unwrap().contains(channel_id) {
                return Err(ProviderError::server("stop failed"));
            }
            Ok(())
        })
    }

    fn list_changed_events(&self, query: ChangeQuery) -> BoxFuture<'_, ProviderResult<EventPage>> {
        Box::pin(async move {
            self.recorded.lock().unwrap().lists.push(query);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(EventPage::default()))
        })
    }

    fn get_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        Box::pin(async move {
            self.recorded.lock().unwrap().gets.push(event_id.to_string());
            if self.failing_gets.lock().unwrap().contains(event_id) {
                return Err(ProviderError::not_found(format!("{} is gone", event_id)));
            }
            Ok(self
                .events
                .lock()
                .unwrap()
                .get(event_id)
                .cloned()
                .unwrap_or_else(|| CalendarEvent::new(event_id)))
        })
    }
}
