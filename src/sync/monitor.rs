//! Connectivity and trigger monitoring.
//!
//! Every trigger source is funnelled into [`QueueManager::flush_with`]; the
//! flush's single-flight guard absorbs bursts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use super::background::WorkerMessage;
use super::manager::QueueManager;
use super::report::{FlushReport, FlushTrigger};
use crate::error::KioskError;

/// Something that may make queued work runnable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The platform reported a connectivity transition.
    ConnectivityChanged(bool),
    /// The background worker asked for a sync.
    SyncRequested,
    /// The periodic retry timer fired.
    TimerTick,
}

impl From<WorkerMessage> for Signal {
    fn from(message: WorkerMessage) -> Self {
        match message {
            WorkerMessage::SyncQueues => Self::SyncRequested,
        }
    }
}

impl Signal {
    /// Parse one line of the `watch` input protocol.
    ///
    /// Accepts `online`, `offline`, `tick`, or a worker JSON message.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "" => None,
            "online" => Some(Self::ConnectivityChanged(true)),
            "offline" => Some(Self::ConnectivityChanged(false)),
            "tick" => Some(Self::TimerTick),
            _ => WorkerMessage::parse(line).map(Self::from),
        }
    }
}

/// Drives flushes from connectivity changes, worker messages, and a timer.
pub struct ConnectivityMonitor {
    manager: Arc<QueueManager>,
    tick_interval: Duration,
}

impl ConnectivityMonitor {
    #[must_use]
    pub const fn new(manager: Arc<QueueManager>, tick_interval: Duration) -> Self {
        Self {
            manager,
            tick_interval,
        }
    }

    /// React to one signal, returning the flush report if a flush ran.
    ///
    /// # Errors
    ///
    /// Returns an error only if the queue store is unusable.
    pub async fn handle(&self, signal: Signal) -> Result<Option<FlushReport>, KioskError> {
        tracing::debug!(?signal, "signal received");

        let trigger = match signal {
            Signal::ConnectivityChanged(false) => {
                self.manager.set_online(false);
                return Ok(None);
            },
            Signal::ConnectivityChanged(true) => {
                if self.manager.set_online(true) {
                    return Ok(None);
                }
                FlushTrigger::Reconnect
            },
            Signal::SyncRequested => FlushTrigger::WorkerSignal,
            Signal::TimerTick => FlushTrigger::Timer,
        };

        self.manager.flush_with(trigger).await.map(Some)
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    ///
    /// Losing every signal sender only ends signal input; the timer keeps
    /// running.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue store becomes unusable.
    pub async fn run(
        &self,
        signals: mpsc::Receiver<Signal>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), KioskError> {
        self.run_with(signals, shutdown, |_| {}).await
    }

    /// Like [`ConnectivityMonitor::run`], passing each flush report to
    /// `on_report`.
    ///
    /// The timer's first tick fires immediately, so work left over from a
    /// previous session is attempted on startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue store becomes unusable.
    pub async fn run_with<F>(
        &self,
        mut signals: mpsc::Receiver<Signal>,
        mut shutdown: watch::Receiver<bool>,
        mut on_report: F,
    ) -> Result<(), KioskError>
    where
        F: FnMut(&FlushReport) + Send,
    {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            tick_secs = self.tick_interval.as_secs(),
            "connectivity monitor started"
        );

        let mut signals_open = true;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let signal = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                received = signals.recv(), if signals_open => match received {
                    Some(signal) => signal,
                    None => {
                        tracing::info!("signal input closed; continuing on timer");
                        signals_open = false;
                        continue;
                    }
                },
                _ = ticker.tick() => Signal::TimerTick,
            };

            if let Some(report) = self.handle(signal).await? {
                on_report(&report);
            }
        }

        tracing::info!("connectivity monitor stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::sync::clock::ManualClock;
    use crate::sync::item::CheckInPayload;
    use crate::sync::remote::RemoteError;
    use crate::sync::report::SkipReason;
    use crate::sync::store::QueueStore;
    use crate::sync::testing::{Reply, ScriptedRemote};

    fn manager(script: Vec<Reply>, clock: Arc<ManualClock>) -> Arc<QueueManager> {
        let manager = QueueManager::new(
            QueueStore::in_memory().unwrap(),
            Arc::new(ScriptedRemote::new(script)),
        )
        .with_clock(clock)
        .with_rng_seed(3);
        Arc::new(manager)
    }

    fn monitor(manager: &Arc<QueueManager>) -> ConnectivityMonitor {
        ConnectivityMonitor::new(manager.clone(), Duration::from_secs(15))
    }

    fn enqueue(manager: &QueueManager) {
        manager
            .enqueue(CheckInPayload::new("pine-lake", "R-1"))
            .unwrap();
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            Signal::parse_line("online"),
            Some(Signal::ConnectivityChanged(true))
        );
        assert_eq!(
            Signal::parse_line("  OFFLINE \n"),
            Some(Signal::ConnectivityChanged(false))
        );
        assert_eq!(Signal::parse_line("tick"), Some(Signal::TimerTick));
        assert_eq!(
            Signal::parse_line(r#"{"type":"SYNC_QUEUES"}"#),
            Some(Signal::SyncRequested)
        );
        assert_eq!(Signal::parse_line(""), None);
        assert_eq!(Signal::parse_line("reboot"), None);
    }

    #[tokio::test]
    async fn test_reconnect_flushes_once() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager(Vec::new(), clock);
        manager.set_online(false);
        enqueue(&manager);
        let monitor = monitor(&manager);

        let report = monitor
            .handle(Signal::ConnectivityChanged(true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.trigger, FlushTrigger::Reconnect);
        assert_eq!(report.succeeded, 1);

        // Already online: no transition, no flush
        let again = monitor
            .handle(Signal::ConnectivityChanged(true))
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_going_offline_only_updates_belief() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager(Vec::new(), clock);
        enqueue(&manager);
        let monitor = monitor(&manager);

        let report = monitor
            .handle(Signal::ConnectivityChanged(false))
            .await
            .unwrap();
        assert!(report.is_none());
        assert!(!manager.is_online());

        let tick = monitor.handle(Signal::TimerTick).await.unwrap().unwrap();
        assert_eq!(tick.skipped, Some(SkipReason::Offline));
        assert_eq!(manager.items().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_request_flushes_while_offline() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager(Vec::new(), clock);
        manager.set_online(false);
        enqueue(&manager);

        let report = monitor(&manager)
            .handle(Signal::SyncRequested)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.trigger, FlushTrigger::WorkerSignal);
        assert_eq!(report.succeeded, 1);
        assert!(manager.items().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_handles_signals_until_shutdown() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager(Vec::new(), clock);
        manager.set_online(false);
        enqueue(&manager);
        let monitor = monitor(&manager);

        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (report_tx, mut reports) = mpsc::unbounded_channel();
        tx.send(Signal::ConnectivityChanged(true)).await.unwrap();
        drop(tx);

        let handle = tokio::spawn(async move {
            monitor
                .run_with(rx, stop_rx, move |report| {
                    let _ = report_tx.send(report.clone());
                })
                .await
        });

        let reconnect = loop {
            let report = reports.recv().await.unwrap();
            if report.trigger == FlushTrigger::Reconnect {
                break report;
            }
        };
        assert_eq!(reconnect.succeeded, 1);
        assert!(manager.is_online());
        assert!(manager.items().unwrap().is_empty());

        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_sender_drops() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager(Vec::new(), clock);

        let (_tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        drop(stop_tx);

        monitor(&manager).run(rx, stop_rx).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_keeps_running_after_signal_input_closes() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let transient = Reply::Fail(RemoteError::network("connection refused"));
        let manager = manager(vec![transient], clock.clone());
        let monitor = monitor(&manager);

        let (tx, rx) = mpsc::channel::<Signal>(8);
        drop(tx);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (report_tx, mut reports) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            monitor
                .run_with(rx, stop_rx, move |report| {
                    let _ = report_tx.send(report.clone());
                })
                .await
        });

        // Startup tick sees an empty queue
        assert_eq!(reports.recv().await.unwrap().attempted(), 0);

        enqueue(&manager);
        let first = reports.recv().await.unwrap();
        assert_eq!(first.trigger, FlushTrigger::Timer);
        assert_eq!(first.rescheduled, 1);

        clock.advance(ChronoDuration::seconds(2));
        let second = reports.recv().await.unwrap();
        assert_eq!(second.succeeded, 1);
        assert!(!handle.is_finished());

        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager(Vec::new(), clock);
        let monitor = monitor(&manager);

        let (_tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { monitor.run(rx, stop_rx).await });
        stop_tx.send(true).unwrap();

        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_retries_rescheduled_items() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let transient = Reply::Fail(RemoteError::network("connection refused"));
        let manager = manager(vec![transient], clock.clone());
        enqueue(&manager);
        let monitor = monitor(&manager);

        let (_tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (report_tx, mut reports) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            monitor
                .run_with(rx, stop_rx, move |report| {
                    let _ = report_tx.send(report.clone());
                })
                .await
        });

        let first = reports.recv().await.unwrap();
        assert_eq!(first.trigger, FlushTrigger::Timer);
        assert_eq!(first.rescheduled, 1);

        clock.advance(ChronoDuration::seconds(2));

        let second = reports.recv().await.unwrap();
        assert_eq!(second.trigger, FlushTrigger::Timer);
        assert_eq!(second.succeeded, 1);
        assert!(manager.items().unwrap().is_empty());

        stop_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
