//! Platform background-sync registration and the worker message contract.

use serde::Deserialize;

use crate::error::KioskError;

/// Tag registered with the platform when work is pending.
pub const SYNC_TAG: &str = "kiosk-sync";

/// Asks the hosting platform to wake the queue when connectivity returns.
///
/// Registration is best-effort: a failure only delays recovery.
pub trait BackgroundSync: Send + Sync {
    /// Register interest in a sync event for `tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses the registration.
    fn register(&self, tag: &str) -> Result<(), KioskError>;
}

/// For hosts without a background-sync facility.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackgroundSync;

impl BackgroundSync for NoopBackgroundSync {
    fn register(&self, tag: &str) -> Result<(), KioskError> {
        tracing::trace!(tag, "background sync unavailable; relying on timer");
        Ok(())
    }
}

/// A message delivered from the background worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    /// Attempt a flush now.
    #[serde(rename = "SYNC_QUEUES")]
    SyncQueues,
}

impl WorkerMessage {
    /// Parse a raw message, returning `None` for unrecognized shapes.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognized worker message");
                None
            }
        }
    }
}
