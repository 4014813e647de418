//! Calendar provider access for calhook.
//!
//! - [`CalendarApi`] - what an authorized connection to the provider can do
//! - [`google`] - the Google Calendar implementation, OAuth and token storage
//! - [`ProviderError`] - error type for every outbound call
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  code / refresh   ┌──────────────┐
//! │ OAuthClient  │──────────────────▶│ TokenStorage │
//! └──────────────┘                   └──────┬───────┘
//!                                           │ access token
//!                                           ▼
//!                                ┌──────────────────────┐
//!                                │ GoogleCalendarClient │
//!                                └──────────┬───────────┘
//!                                           │ impl CalendarApi
//!                                           ▼
//!                           watch / stop / list changed / get
//! ```

pub mod api;
pub mod error;
pub mod google;

pub use api::{
    BoxFuture, CalendarApi, CalendarEvent, ChangeQuery, EventPage, WatchRequest, WatchResponse,
};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
