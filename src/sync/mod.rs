//! Offline-resilient action queue.
//!
//! Check-in actions captured while the kiosk is offline are persisted here and
//! executed later against the remote service.
//!
//! Features:
//! - Durable queue in a single SQLite slot
//! - Automatic retry with exponential backoff and jitter
//! - Idempotency keys so retries never duplicate server-side effects
//! - Conflict quarantine with operator retry and discard
//! - Flushes driven by connectivity changes, worker messages, and a timer

pub mod background;
pub mod backoff;
pub mod clock;
mod conflicts;
pub mod http;
pub mod item;
pub mod manager;
pub mod monitor;
pub mod remote;
pub mod report;
pub mod store;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use background::{BackgroundSync, NoopBackgroundSync, WorkerMessage, SYNC_TAG};
pub use backoff::BackoffPolicy;
pub use clock::{Clock, ManualClock, SystemClock};
pub use http::HttpCheckInRemote;
pub use item::{ActionPayload, CheckInPayload, QueueItem};
pub use manager::{QueueManager, QueueStats};
pub use monitor::{ConnectivityMonitor, Signal};
pub use remote::{CheckInRemote, ErrorClass, RemoteError};
pub use report::{format_flush_report, FlushReport, FlushTrigger, Outcome, SkipReason};
pub use store::{QueueStore, QUEUE_SLOT};
pub use telemetry::{EventType, MemoryTelemetry, TelemetryEvent, TelemetrySink, TracingTelemetry};
