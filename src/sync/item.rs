//! Queue items and the actions they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The operation a queued item performs when executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    /// Finish a guest check-in that the kiosk could not complete online.
    CompleteCheckIn(CheckInPayload),
}

impl ActionPayload {
    /// Get the display name for this action.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::CompleteCheckIn(_) => "Complete Check-in",
        }
    }

    /// Short human-readable target of the action.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::CompleteCheckIn(p) => match &p.guest_name {
                Some(guest) => format!("reservation {} ({guest})", p.reservation_id),
                None => format!("reservation {}", p.reservation_id),
            },
        }
    }
}

impl std::fmt::Display for ActionPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Data needed to complete a check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInPayload {
    pub campground_id: String,
    pub reservation_id: String,
    #[serde(default)]
    pub add_on_ids: Vec<String>,
    /// Add-on total computed by the kiosk at capture time, in cents.
    #[serde(default)]
    pub add_on_total_cents: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
}

impl CheckInPayload {
    /// Create a payload with no add-ons.
    #[must_use]
    pub fn new(campground_id: impl Into<String>, reservation_id: impl Into<String>) -> Self {
        Self {
            campground_id: campground_id.into(),
            reservation_id: reservation_id.into(),
            add_on_ids: Vec::new(),
            add_on_total_cents: 0,
            payment_reference: None,
            guest_name: None,
        }
    }
}

impl From<CheckInPayload> for ActionPayload {
    fn from(payload: CheckInPayload) -> Self {
        Self::CompleteCheckIn(payload)
    }
}

/// A durable, retryable unit of intent.
///
/// Serialized with camelCase field names; every field round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Identity, unique per item and never reused.
    pub id: String,
    /// Token sent on every attempt so the server collapses repeats.
    pub idempotency_key: String,
    pub payload: ActionPayload,
    /// Failed execution attempts so far.
    pub attempt: u32,
    /// The scheduler must not attempt the item before this instant.
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Automatic retry is suspended until an operator decides.
    #[serde(default)]
    pub conflict: bool,
    /// Value of `attempt` when an operator last re-armed the item.
    #[serde(default)]
    pub rearmed_at_attempt: u32,
}

impl QueueItem {
    /// Create a fresh item, due immediately.
    #[must_use]
    pub fn new(payload: ActionPayload, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            idempotency_key: Uuid::new_v4().to_string(),
            payload,
            attempt: 0,
            next_attempt_at: now,
            created_at: now,
            last_error: None,
            conflict: false,
            rearmed_at_attempt: 0,
        }
    }

    /// Whether the scheduler may execute this item at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.conflict && self.next_attempt_at <= now
    }

    /// Failed attempts since creation or the last operator re-arm.
    #[must_use]
    pub const fn attempts_since_rearm(&self) -> u32 {
        self.attempt.saturating_sub(self.rearmed_at_attempt)
    }
}
