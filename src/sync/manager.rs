//! The queue manager: enqueueing and the flush engine.
//!
//! One `QueueManager` is constructed per kiosk session and shared by `Arc`
//! between the UI-facing commands and the trigger monitor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::json;

use super::background::{BackgroundSync, NoopBackgroundSync, SYNC_TAG};
use super::backoff::BackoffPolicy;
use super::clock::{Clock, SystemClock};
use super::item::{ActionPayload, QueueItem};
use super::remote::{CheckInRemote, ErrorClass, RemoteError};
use super::report::{FlushReport, FlushTrigger, ItemOutcome, Outcome, SkipReason};
use super::store::QueueStore;
use super::telemetry::{EventType, TelemetryEvent, TelemetrySink, TracingTelemetry};
use crate::config::QueueConfig;
use crate::error::KioskError;

/// Default transient-failure budget before an item needs an operator.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Owns the durable queue and schedules its execution.
pub struct QueueManager {
    store: QueueStore,
    remote: Arc<dyn CheckInRemote>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn TelemetrySink>,
    background: Arc<dyn BackgroundSync>,
    backoff: BackoffPolicy,
    max_attempts: Option<u32>,
    rng: Mutex<StdRng>,
    online: AtomicBool,
    flushing: AtomicBool,
}

/// Clears the in-progress flag when a flush pass ends, however it ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Queue counts for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Items awaiting automatic execution.
    pub pending: usize,
    /// Pending items whose backoff has elapsed.
    pub due: usize,
    /// Items waiting for an operator.
    pub conflicted: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl QueueManager {
    /// Create a manager with wall-clock time, tracing telemetry, and the
    /// default backoff.
    #[must_use]
    pub fn new(store: QueueStore, remote: Arc<dyn CheckInRemote>) -> Self {
        Self {
            store,
            remote,
            clock: Arc::new(SystemClock),
            telemetry: Arc::new(TracingTelemetry),
            background: Arc::new(NoopBackgroundSync),
            backoff: BackoffPolicy::default(),
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            rng: Mutex::new(StdRng::from_entropy()),
            online: AtomicBool::new(true),
            flushing: AtomicBool::new(false),
        }
    }

    /// Create a manager using the retry settings from `config`.
    #[must_use]
    pub fn from_config(
        store: QueueStore,
        remote: Arc<dyn CheckInRemote>,
        config: &QueueConfig,
    ) -> Self {
        Self::new(store, remote)
            .with_backoff(config.backoff())
            .with_max_attempts(config.max_attempts)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    #[must_use]
    pub fn with_background_sync(mut self, background: Arc<dyn BackgroundSync>) -> Self {
        self.background = background;
        self
    }

    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the transient-failure budget; `None` retries forever.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Use a deterministic jitter source.
    #[must_use]
    pub fn with_rng_seed(self, seed: u64) -> Self {
        if let Ok(mut rng) = self.rng.lock() {
            *rng = StdRng::seed_from_u64(seed);
        }
        self
    }

    /// Set the initial connectivity belief.
    #[must_use]
    pub fn with_online(self, online: bool) -> Self {
        self.online.store(online, Ordering::Release);
        self
    }

    pub(crate) fn store(&self) -> &QueueStore {
        &self.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn emit(&self, event: TelemetryEvent) {
        self.telemetry.emit(event);
    }

    /// Current connectivity belief.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Update the connectivity belief, returning the previous value.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::AcqRel);
        if previous != online {
            tracing::info!(online, "connectivity changed");
        }
        previous
    }

    /// Whether a flush pass is running.
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Append a new action and persist it.
    ///
    /// Synchronous and safe to call while a flush is in progress: the new item
    /// survives that pass's persist step and is picked up by the next pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn enqueue(&self, payload: impl Into<ActionPayload>) -> Result<QueueItem, KioskError> {
        let item = QueueItem::new(payload.into(), self.now());
        self.store.update(|items| items.push(item.clone()))?;

        if let Err(e) = self.background.register(SYNC_TAG) {
            tracing::debug!(error = %e, "background sync registration failed");
        }

        tracing::info!(id = %item.id, action = %item.payload, "queued action");
        self.emit(TelemetryEvent::new(
            EventType::Queue,
            "queued",
            format!("queued {}", item.payload.summary()),
            item_meta(&item),
        ));

        Ok(item)
    }

    /// All queued items, in queue order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn items(&self) -> Result<Vec<QueueItem>, KioskError> {
        self.store.load()
    }

    /// Look up one item.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get(&self, id: &str) -> Result<Option<QueueItem>, KioskError> {
        Ok(self.store.load()?.into_iter().find(|item| item.id == id))
    }

    /// Queue counts relative to the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn stats(&self) -> Result<QueueStats, KioskError> {
        let now = self.now();
        let items = self.store.load()?;
        let (conflicted, pending): (Vec<_>, Vec<_>) = items.iter().partition(|i| i.conflict);

        Ok(QueueStats {
            pending: pending.len(),
            due: pending.iter().filter(|i| i.is_due(now)).count(),
            conflicted: conflicted.len(),
            oldest: items.iter().map(|i| i.created_at).min(),
            next_attempt_at: pending.iter().map(|i| i.next_attempt_at).min(),
        })
    }

    /// Remove every item.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn clear(&self) -> Result<usize, KioskError> {
        let removed = self.store.clear()?;
        if removed > 0 {
            tracing::warn!(removed, "queue cleared");
            self.emit(TelemetryEvent::new(
                EventType::Queue,
                "cleared",
                format!("cleared {removed} queued actions"),
                json!({ "removed": removed }),
            ));
        }
        Ok(removed)
    }

    /// Run one flush pass on behalf of a caller.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store is unusable.
    pub async fn flush(&self) -> Result<FlushReport, KioskError> {
        self.flush_with(FlushTrigger::Manual).await
    }

    /// Run one flush pass.
    ///
    /// Returns immediately if another pass is running, or if connectivity is
    /// known to be down and `trigger` does not override it. Remote failures
    /// never escape: they are recorded on the item.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store is unusable.
    pub async fn flush_with(&self, trigger: FlushTrigger) -> Result<FlushReport, KioskError> {
        let Some(_guard) = self.begin_flight() else {
            tracing::debug!(?trigger, "flush already in progress");
            return Ok(FlushReport::skipped(trigger, SkipReason::InProgress));
        };

        if !trigger.bypasses_connectivity() && !self.is_online() {
            tracing::debug!(?trigger, "offline; flush skipped");
            return Ok(FlushReport::skipped(trigger, SkipReason::Offline));
        }

        let now = self.now();
        let due: Vec<QueueItem> = self
            .store
            .load()?
            .into_iter()
            .filter(|item| item.is_due(now))
            .collect();

        let mut report = FlushReport::new(trigger);
        if due.is_empty() {
            return Ok(report);
        }

        tracing::info!(?trigger, due = due.len(), "flushing queued actions");

        // id -> replacement; `None` removes the item
        let mut outcomes: HashMap<String, Option<QueueItem>> = HashMap::with_capacity(due.len());

        for item in due {
            let result = self
                .remote
                .perform_action(&item.payload, &item.idempotency_key)
                .await;

            match result {
                Ok(()) => {
                    tracing::info!(id = %item.id, "action delivered");
                    self.emit(TelemetryEvent::new(
                        EventType::Sync,
                        "success",
                        format!("delivered {}", item.payload.summary()),
                        item_meta(&item),
                    ));
                    report.add(ItemOutcome {
                        id: item.id.clone(),
                        summary: item.payload.summary(),
                        attempt: item.attempt,
                        outcome: Outcome::Succeeded,
                        error: None,
                    });
                    outcomes.insert(item.id, None);
                },
                Err(err) => {
                    let (updated, outcome) = self.reclassify(item, &err, now);
                    report.add(ItemOutcome {
                        id: updated.id.clone(),
                        summary: updated.payload.summary(),
                        attempt: updated.attempt,
                        outcome,
                        error: updated.last_error.clone(),
                    });
                    outcomes.insert(updated.id.clone(), Some(updated));
                },
            }
        }

        // Merge against the latest contents, not the snapshot: items enqueued
        // during the pass are kept and items discarded during it stay gone.
        self.store.update(|items| {
            let latest = std::mem::take(items);
            *items = latest
                .into_iter()
                .filter_map(|item| match outcomes.remove(&item.id) {
                    Some(outcome) => outcome,
                    None => Some(item),
                })
                .collect();
        })?;

        tracing::info!(
            succeeded = report.succeeded,
            rescheduled = report.rescheduled,
            conflicted = report.conflicted,
            "flush finished"
        );

        Ok(report)
    }

    fn begin_flight(&self) -> Option<FlightGuard<'_>> {
        self.flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(&self.flushing))
    }

    /// Apply a failed execution to `item`.
    fn reclassify(
        &self,
        mut item: QueueItem,
        err: &RemoteError,
        now: DateTime<Utc>,
    ) -> (QueueItem, Outcome) {
        item.attempt = item.attempt.saturating_add(1);
        item.last_error = Some(err.to_string());

        if err.classify() == ErrorClass::Conflict {
            item.conflict = true;
            tracing::warn!(id = %item.id, error = %err, "action conflicts with server state");
            self.emit(TelemetryEvent::new(
                EventType::Conflict,
                "conflict",
                err.to_string(),
                item_meta(&item),
            ));
            return (item, Outcome::Conflicted);
        }

        let failures = item.attempts_since_rearm();
        if self.max_attempts.is_some_and(|max| failures >= max) {
            item.conflict = true;
            item.last_error = Some(format!("retries exhausted after {failures} attempts: {err}"));
            tracing::warn!(id = %item.id, failures, "retry budget exhausted");
            self.emit(TelemetryEvent::new(
                EventType::Conflict,
                "retries_exhausted",
                err.to_string(),
                item_meta(&item),
            ));
            return (item, Outcome::Exhausted);
        }

        let delay = self.next_delay(failures.saturating_sub(1));
        item.next_attempt_at = now
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        tracing::debug!(
            id = %item.id,
            attempt = item.attempt,
            next_attempt_at = %item.next_attempt_at,
            error = %err,
            "transient failure; rescheduled"
        );
        self.emit(TelemetryEvent::new(
            EventType::Error,
            "retry_scheduled",
            err.to_string(),
            item_meta(&item),
        ));

        let next_attempt_at = item.next_attempt_at;
        (item, Outcome::Rescheduled { next_attempt_at })
    }

    fn next_delay(&self, prior_failures: u32) -> chrono::Duration {
        let delay = match self.rng.lock() {
            Ok(mut rng) => self.backoff.delay(prior_failures, &mut *rng),
            Err(_) => self.backoff.capped_delay(prior_failures),
        };
        chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(365))
    }
}

pub(crate) fn item_meta(item: &QueueItem) -> serde_json::Value {
    json!({
        "id": item.id,
        "idempotencyKey": item.idempotency_key,
        "action": item.payload.display_name(),
        "target": item.payload.summary(),
        "attempt": item.attempt,
        "nextAttemptAt": item.next_attempt_at.to_rfc3339(),
        "conflict": item.conflict,
    })
}
