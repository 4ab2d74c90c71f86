//! Structured events for every queue state transition.
//!
//! Emission is fire-and-forget: sinks cannot fail the caller.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Source tag attached to every event from this crate.
pub const TELEMETRY_SOURCE: &str = "kiosk-queue";

/// Event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// An item executed successfully.
    Sync,
    /// An item was added to or removed from the queue by a caller.
    Queue,
    /// An item was quarantined for operator review.
    Conflict,
    /// A transient failure; the item was rescheduled.
    Error,
}

/// One structured telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub status: String,
    pub message: String,
    pub meta: Value,
}

impl TelemetryEvent {
    #[must_use]
    pub fn new(
        event_type: EventType,
        status: impl Into<String>,
        message: impl Into<String>,
        meta: Value,
    ) -> Self {
        Self {
            source: TELEMETRY_SOURCE.to_string(),
            event_type,
            status: status.into(),
            message: message.into(),
            meta,
        }
    }
}

/// Receives telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

/// Writes events to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        let meta = event.meta.to_string();
        match event.event_type {
            EventType::Sync | EventType::Queue => tracing::info!(
                target: "kiosk_sync::telemetry",
                source = %event.source,
                kind = ?event.event_type,
                status = %event.status,
                meta = %meta,
                "{}",
                event.message
            ),
            EventType::Conflict | EventType::Error => tracing::warn!(
                target: "kiosk_sync::telemetry",
                source = %event.source,
                kind = ?event.event_type,
                status = %event.status,
                meta = %meta,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemoryTelemetry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Recorded events of one type.
    #[must_use]
    pub fn of_type(&self, event_type: EventType) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
