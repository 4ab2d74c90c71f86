//! Operator decisions on conflicted items.

use super::item::QueueItem;
use super::manager::{item_meta, QueueManager};
use super::report::{FlushReport, FlushTrigger};
use super::telemetry::{EventType, TelemetryEvent};
use crate::error::KioskError;

impl QueueManager {
    /// Items waiting for an operator, in queue order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list_conflicts(&self) -> Result<Vec<QueueItem>, KioskError> {
        Ok(self
            .items()?
            .into_iter()
            .filter(|item| item.conflict)
            .collect())
    }

    /// Make a conflicted item eligible for automatic execution again.
    ///
    /// The item becomes due immediately and gets a fresh retry budget. Its
    /// `attempt` count and idempotency key are kept.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `Conflict` if the item is not
    /// waiting for an operator.
    pub fn rearm(&self, id: &str) -> Result<QueueItem, KioskError> {
        let now = self.now();
        let item = self.store().update(|items| -> Result<QueueItem, KioskError> {
            let item = items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or_else(|| KioskError::NotFound(format!("Queued action '{id}'")))?;
            if !item.conflict {
                return Err(KioskError::Conflict(format!(
                    "Queued action '{id}' is not awaiting a decision"
                )));
            }

            item.conflict = false;
            item.next_attempt_at = now;
            item.rearmed_at_attempt = item.attempt;
            Ok(item.clone())
        })??;

        tracing::info!(id = %item.id, "conflicted action re-armed");
        self.emit(TelemetryEvent::new(
            EventType::Queue,
            "retry_requested",
            format!("operator retried {}", item.payload.summary()),
            item_meta(&item),
        ));

        Ok(item)
    }

    /// Re-arm a conflicted item and attempt a flush straight away.
    ///
    /// # Errors
    ///
    /// See [`QueueManager::rearm`] and [`QueueManager::flush_with`].
    pub async fn retry(&self, id: &str) -> Result<FlushReport, KioskError> {
        self.rearm(id)?;
        self.flush_with(FlushTrigger::OperatorRetry).await
    }

    /// Drop a conflicted item permanently. Its action will never run.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `Conflict` if the item is still
    /// scheduled for automatic retry.
    pub fn discard(&self, id: &str) -> Result<QueueItem, KioskError> {
        let item = self.store().update(|items| -> Result<QueueItem, KioskError> {
            let index = items
                .iter()
                .position(|item| item.id == id)
                .ok_or_else(|| KioskError::NotFound(format!("Queued action '{id}'")))?;
            if !items[index].conflict {
                return Err(KioskError::Conflict(format!(
                    "Queued action '{id}' is still pending; only conflicted actions can be discarded"
                )));
            }
            Ok(items.remove(index))
        })??;

        tracing::warn!(id = %item.id, action = %item.payload, "conflicted action discarded");
        self.emit(TelemetryEvent::new(
            EventType::Queue,
            "discarded",
            format!("operator discarded {}", item.payload.summary()),
            item_meta(&item),
        ));

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use crate::error::KioskError;
    use crate::sync::clock::{Clock, ManualClock};
    use crate::sync::item::CheckInPayload;
    use crate::sync::manager::QueueManager;
    use crate::sync::remote::RemoteError;
    use crate::sync::report::{FlushTrigger, Outcome};
    use crate::sync::store::QueueStore;
    use crate::sync::telemetry::{EventType, MemoryTelemetry};
    use crate::sync::testing::{GatedRemote, Reply, ScriptedRemote};

    fn conflict() -> Reply {
        Reply::Fail(RemoteError::new(Some(409), "state changed on server"))
    }

    fn transient() -> Reply {
        Reply::Fail(RemoteError::new(Some(503), "Service Unavailable"))
    }

    struct Setup {
        manager: Arc<QueueManager>,
        remote: Arc<ScriptedRemote>,
        clock: Arc<ManualClock>,
        telemetry: Arc<MemoryTelemetry>,
    }

    fn setup(script: Vec<Reply>) -> Setup {
        let remote = Arc::new(ScriptedRemote::new(script));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let telemetry = Arc::new(MemoryTelemetry::new());
        let manager = QueueManager::new(QueueStore::in_memory().unwrap(), remote.clone())
            .with_clock(clock.clone())
            .with_telemetry(telemetry.clone())
            .with_rng_seed(7);
        Setup {
            manager: Arc::new(manager),
            remote,
            clock,
            telemetry,
        }
    }

    async fn conflicted_item(s: &Setup) -> String {
        let item = s
            .manager
            .enqueue(CheckInPayload::new("pine-lake", "R-1"))
            .unwrap();
        s.manager.flush().await.unwrap();
        assert!(s.manager.get(&item.id).unwrap().unwrap().conflict);
        item.id
    }

    #[tokio::test]
    async fn test_list_conflicts_only_returns_conflicted() {
        let s = setup(vec![conflict()]);
        let id = conflicted_item(&s).await;
        s.manager
            .enqueue(CheckInPayload::new("pine-lake", "R-2"))
            .unwrap();

        let conflicts = s.manager.list_conflicts().unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, id);
        assert_eq!(s.manager.items().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_after_conflict_succeeds() {
        let s = setup(vec![conflict()]);
        let id = conflicted_item(&s).await;
        let key = s.manager.get(&id).unwrap().unwrap().idempotency_key;

        let report = s.manager.retry(&id).await.unwrap();

        assert_eq!(report.trigger, FlushTrigger::OperatorRetry);
        assert_eq!(report.succeeded, 1);
        assert!(s.manager.items().unwrap().is_empty());
        assert_eq!(s.remote.calls(), vec![key.clone(), key]);
    }

    #[tokio::test]
    async fn test_rearm_resets_schedule_and_budget() {
        let s = setup(vec![conflict()]);
        let id = conflicted_item(&s).await;
        s.clock.advance(Duration::minutes(3));

        let item = s.manager.rearm(&id).unwrap();

        assert!(!item.conflict);
        assert_eq!(item.next_attempt_at, s.clock.now());
        assert_eq!(item.attempt, 1);
        assert_eq!(item.attempts_since_rearm(), 0);
        assert_eq!(item.last_error.as_deref(), Some("409: state changed on server"));
        assert!(s
            .telemetry
            .of_type(EventType::Queue)
            .iter()
            .any(|e| e.status == "retry_requested"));
    }

    #[tokio::test]
    async fn test_rearmed_item_backs_off_from_base_delay() {
        let s = setup(vec![conflict(), transient()]);
        let id = conflicted_item(&s).await;
        let now = s.clock.now();

        let report = s.manager.retry(&id).await.unwrap();

        assert!(matches!(
            report.results[0].outcome,
            Outcome::Rescheduled { .. }
        ));
        let item = s.manager.get(&id).unwrap().unwrap();
        assert_eq!(item.attempt, 2);
        assert!(item.next_attempt_at - now <= Duration::milliseconds(1_500));
    }

    #[tokio::test]
    async fn test_retry_conflicting_again_stays_conflicted() {
        let s = setup(vec![conflict(), conflict()]);
        let id = conflicted_item(&s).await;

        let report = s.manager.retry(&id).await.unwrap();

        assert_eq!(report.conflicted, 1);
        assert!(s.manager.get(&id).unwrap().unwrap().conflict);
    }

    #[test]
    fn test_rearm_unknown_id() {
        let s = setup(Vec::new());
        assert!(matches!(
            s.manager.rearm("missing"),
            Err(KioskError::NotFound(_))
        ));
    }

    #[test]
    fn test_rearm_pending_item_is_rejected() {
        let s = setup(Vec::new());
        let item = s
            .manager
            .enqueue(CheckInPayload::new("pine-lake", "R-1"))
            .unwrap();
        assert!(matches!(
            s.manager.rearm(&item.id),
            Err(KioskError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_discard_removes_conflicted_item() {
        let s = setup(vec![conflict()]);
        let id = conflicted_item(&s).await;

        let removed = s.manager.discard(&id).unwrap();

        assert_eq!(removed.id, id);
        assert!(s.manager.items().unwrap().is_empty());
        assert!(s
            .telemetry
            .of_type(EventType::Queue)
            .iter()
            .any(|e| e.status == "discarded"));

        // Never executed again
        s.clock.advance(Duration::hours(1));
        s.manager.flush().await.unwrap();
        assert_eq!(s.remote.calls().len(), 1);
    }

    #[test]
    fn test_discard_unknown_and_pending() {
        let s = setup(Vec::new());
        assert!(matches!(
            s.manager.discard("missing"),
            Err(KioskError::NotFound(_))
        ));

        let item = s
            .manager
            .enqueue(CheckInPayload::new("pine-lake", "R-1"))
            .unwrap();
        assert!(matches!(
            s.manager.discard(&item.id),
            Err(KioskError::Conflict(_))
        ));
        assert_eq!(s.manager.items().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_discard_during_flush_is_not_resurrected() {
        let remote = Arc::new(GatedRemote::new());
        let manager = Arc::new(QueueManager::new(
            QueueStore::in_memory().unwrap(),
            remote.clone(),
        ));

        let conflicted = manager
            .enqueue(CheckInPayload::new("pine-lake", "R-1"))
            .unwrap();
        manager
            .store()
            .update(|items| items[0].conflict = true)
            .unwrap();
        let pending = manager
            .enqueue(CheckInPayload::new("pine-lake", "R-2"))
            .unwrap();

        let flushing = manager.clone();
        let flush = tokio::spawn(async move { flushing.flush().await });
        remote.wait_entered().await;

        manager.discard(&conflicted.id).unwrap();

        remote.release(1);
        let report = flush.await.unwrap().unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(remote.calls(), vec![pending.idempotency_key]);
        assert!(manager.items().unwrap().is_empty());
    }
}
