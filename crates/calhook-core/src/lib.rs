//! Core types: event batches, the event log, sync windows, extraction, tracing

pub mod event;
pub mod extract;
pub mod log;
pub mod time;
pub mod tracing;

pub use event::{BookedBy, EnrichedEvent, EventBatch};
pub use extract::extract_booked_by;
pub use log::{EventLog, EventLogError, EventLogResult};
pub use time::{EventTime, SyncWindow, batch_stamp, local_batch_stamp};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
