//! Observed event types.
//!
//! An [`EventBatch`] is what one reconciled notification leaves behind in the
//! [`EventLog`](crate::EventLog): a human-readable stamp plus every
//! [`EnrichedEvent`] fetched for that notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{EventTime, local_batch_stamp};

/// Who booked an event, as extracted from its description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookedBy {
    /// Display name of the person who booked the event.
    pub name: String,
    /// Email address of the person who booked the event.
    pub email: String,
}

impl BookedBy {
    /// Creates a new booking attribution.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A calendar resource after detail enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedEvent {
    /// Provider identifier of the resource.
    pub source_id: String,
    /// Provider status (`confirmed`, `tentative`, `cancelled`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    /// Last modification time reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    /// Organizer email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    /// Extracted booking attribution; absent when the description has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_by: Option<BookedBy>,
}

impl EnrichedEvent {
    /// Creates an event carrying only its source id.
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            status: None,
            summary: None,
            description: None,
            location: None,
            html_link: None,
            updated: None,
            start: None,
            end: None,
            organizer: None,
            booked_by: None,
        }
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the booking attribution.
    pub fn with_booked_by(mut self, booked_by: BookedBy) -> Self {
        self.booked_by = Some(booked_by);
        self
    }

    /// Returns true if the provider reported the resource as deleted.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}

/// One reconciled notification's worth of observed events.
///
/// Appended to the log, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    /// Human-readable stamp, `"<time> | <date>"`.
    pub timestamp: String,
    /// Machine-readable time the batch was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Enriched events in the order they were fetched.
    pub events: Vec<EnrichedEvent>,
}

impl EventBatch {
    /// Creates a batch stamped with the given instant.
    pub fn recorded_at(at: DateTime<Utc>, events: Vec<EnrichedEvent>) -> Self {
        Self {
            timestamp: local_batch_stamp(at),
            recorded_at: at,
            events,
        }
    }

    /// Creates a batch stamped with the current time.
    pub fn now(events: Vec<EnrichedEvent>) -> Self {
        Self::recorded_at(Utc::now(), events)
    }

    /// Returns the number of events in the batch.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the batch carries no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the source ids of the batch's events.
    pub fn source_ids(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.source_id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_keeps_event_order() {
        let batch = EventBatch::now(vec![EnrichedEvent::new("b"), EnrichedEvent::new("a")]);
        assert_eq!(batch.source_ids(), vec!["b", "a"]);
        assert_eq!(batch.len(), 2);
        assert!(batch.timestamp.contains(" | "));
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let event = EnrichedEvent::new("evt-1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({ "sourceId": "evt-1" }));
    }

    #[test]
    fn booked_by_serializes_nested() {
        let event = EnrichedEvent::new("evt-1")
            .with_booked_by(BookedBy::new("Jane Doe", "jane@example.com"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["bookedBy"]["name"], "Jane Doe");
        assert_eq!(json["bookedBy"]["email"], "jane@example.com");
    }

    #[test]
    fn cancelled_status_detected() {
        let mut event = EnrichedEvent::new("evt-1");
        assert!(!event.is_cancelled());
        event.status = Some("cancelled".to_string());
        assert!(event.is_cancelled());
    }

    #[test]
    fn batch_roundtrips_through_json_line() {
        let batch = EventBatch::now(vec![EnrichedEvent::new("evt-1").with_summary("Standup")]);
        let line = serde_json::to_string(&batch).unwrap();
        assert!(!line.contains('\n'));
        let parsed: EventBatch = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, batch);
    }
}
