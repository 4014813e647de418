//! Time types for observed calendar events.
//!
//! This module provides [`EventTime`] for event start/end times (either a
//! specific datetime or an all-day date), [`SyncWindow`] for the "what
//! changed recently" lower bound used after a notification, and the
//! human-readable stamp carried by every [`EventBatch`](crate::EventBatch).

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Represents the start or end time of a calendar event.
///
/// - **DateTime**: A specific point in time, stored as UTC
/// - **AllDay**: A date without a specific time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a datetime in any timezone.
    pub fn from_local<Tz: TimeZone>(dt: DateTime<Tz>) -> Self {
        Self::DateTime(dt.with_timezone(&Utc))
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Converts to a UTC datetime. All-day dates map to midnight UTC.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }
}

/// The lower bound used to ask the provider what changed recently.
///
/// Derived at the moment a notification is processed as `now - buffer`.
/// The buffer must exceed notification delivery latency plus clock skew;
/// a generous buffer only re-fetches already-seen resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    /// Only resources updated at or after this instant are requested.
    pub lower_bound: DateTime<Utc>,
    /// How far before `now` the window reaches.
    pub buffer: Duration,
}

impl SyncWindow {
    /// Default buffer applied when none is configured.
    pub const DEFAULT_BUFFER: Duration = Duration::from_secs(10);

    /// Largest buffer a configuration may ask for.
    pub const MAX_BUFFER: Duration = Duration::from_secs(24 * 60 * 60);

    /// Builds the window ending at `now`.
    ///
    /// Returns `None` when `now - buffer` cannot be represented.
    pub fn ending_at(now: DateTime<Utc>, buffer: Duration) -> Option<Self> {
        let reach = chrono::Duration::from_std(buffer).ok()?;
        let lower_bound = now.checked_sub_signed(reach)?;
        Some(Self {
            lower_bound,
            buffer,
        })
    }

    /// Builds the window ending at the current instant.
    pub fn ending_now(buffer: Duration) -> Option<Self> {
        Self::ending_at(Utc::now(), buffer)
    }

    /// Returns true if `updated` falls inside the window.
    pub fn includes(&self, updated: DateTime<Utc>) -> bool {
        updated >= self.lower_bound
    }
}

/// Formats the batch stamp as `"<time> | <date>"`.
///
/// Example: `14:32:10 GMT+0200 | Mon Oct 19 2026`.
pub fn batch_stamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} | {}",
        at.format("%H:%M:%S GMT%z"),
        at.format("%a %b %d %Y")
    )
}

/// Formats the batch stamp for the current local time.
pub fn local_batch_stamp(now: DateTime<Utc>) -> String {
    batch_stamp(&now.with_timezone(&Local))
}
