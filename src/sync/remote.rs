//! Contract with the remote check-in service.
//!
//! Implementations must treat repeated calls carrying the same idempotency
//! key as one logical operation.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::item::ActionPayload;

/// Messages the server uses when its state no longer matches the request.
static CONFLICT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(conflict|already checked[ -]in|precondition failed|state changed)\b")
        .unwrap_or_else(|e| panic!("Invalid conflict regex: {e}"))
});

/// A failed remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// HTTP-style status, absent for transport failures.
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    #[must_use]
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A failure that never reached the server.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    /// Decide whether the failure may be retried automatically.
    #[must_use]
    pub fn classify(&self) -> ErrorClass {
        if matches!(self.status, Some(409 | 412)) || CONFLICT_PATTERN.is_match(&self.message) {
            ErrorClass::Conflict
        } else {
            ErrorClass::Transient
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{status}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Failure classification at the remote-call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Server state diverged; needs an operator.
    Conflict,
    /// Safe to retry with backoff.
    Transient,
}

/// The remote collaborator that executes queued actions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckInRemote: Send + Sync {
    /// Execute `payload` once, tagged with `idempotency_key`.
    async fn perform_action(
        &self,
        payload: &ActionPayload,
        idempotency_key: &str,
    ) -> Result<(), RemoteError>;
}
