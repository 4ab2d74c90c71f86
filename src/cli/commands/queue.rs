//! Queue command implementations.
//!
//! Handles enqueueing, flushing, and operator decisions on queued actions.

use colored::Colorize;
use serde_json::json;

use crate::cli::args::{EnqueueArgs, OutputFormat};
use crate::error::KioskError;
use crate::output::{format_item, format_items, format_stats, to_json};
use crate::sync::{format_flush_report, CheckInPayload, FlushReport, QueueManager};

/// Show queue status.
///
/// # Errors
///
/// Returns an error if the queue cannot be read.
pub fn status(manager: &QueueManager, format: OutputFormat) -> Result<String, KioskError> {
    let stats = manager.stats()?;
    format_stats(&stats, format, chrono::Utc::now())
}

/// List queued actions.
///
/// # Errors
///
/// Returns an error if the queue cannot be read.
pub fn list(
    manager: &QueueManager,
    conflicts_only: bool,
    format: OutputFormat,
) -> Result<String, KioskError> {
    if conflicts_only {
        return conflicts(manager, format);
    }
    let items = manager.items()?;
    format_items(&items, "Queued Actions", format, chrono::Utc::now())
}

/// List actions awaiting an operator decision.
///
/// # Errors
///
/// Returns an error if the queue cannot be read.
pub fn conflicts(manager: &QueueManager, format: OutputFormat) -> Result<String, KioskError> {
    let items = manager.list_conflicts()?;
    format_items(&items, "Conflicts", format, chrono::Utc::now())
}

/// Queue a check-in.
///
/// # Errors
///
/// Returns an error if the queue cannot be written.
pub fn enqueue(
    manager: &QueueManager,
    args: EnqueueArgs,
    format: OutputFormat,
) -> Result<String, KioskError> {
    if args.add_on_total < 0 {
        return Err(KioskError::Config(
            "--add-on-total must not be negative".to_string(),
        ));
    }

    let item = manager.enqueue(CheckInPayload::from(args))?;

    match format {
        OutputFormat::Json => to_json(&item),
        OutputFormat::Pretty => Ok(format!(
            "Queued {} for {} (ID: {})",
            item.payload.display_name(),
            item.payload.summary(),
            item.id
        )),
    }
}

/// Run one flush pass.
///
/// # Errors
///
/// Returns an error if the queue store is unusable.
pub async fn flush(
    manager: &QueueManager,
    offline: bool,
    format: OutputFormat,
) -> Result<String, KioskError> {
    if offline {
        manager.set_online(false);
    }
    let report = manager.flush().await?;
    render_report(&report, format)
}

/// Re-arm a conflicted action and flush.
///
/// # Errors
///
/// Returns `NotFound` for an unknown id, `Conflict` if the action is not
/// conflicted, or an error if the queue store is unusable.
pub async fn retry(
    manager: &QueueManager,
    id: &str,
    format: OutputFormat,
) -> Result<String, KioskError> {
    let report = manager.retry(id).await?;

    match format {
        OutputFormat::Json => to_json(&report),
        OutputFormat::Pretty => Ok(format!(
            "Re-armed action {id}\n{}",
            format_flush_report(&report)
        )),
    }
}

/// Permanently drop a conflicted action.
///
/// # Errors
///
/// Returns `Config` without `--force`, `NotFound` for an unknown id, or
/// `Conflict` if the action is still pending.
pub fn discard(
    manager: &QueueManager,
    id: &str,
    force: bool,
    format: OutputFormat,
) -> Result<String, KioskError> {
    if !force {
        let item = manager
            .get(id)?
            .ok_or_else(|| KioskError::NotFound(format!("Queued action '{id}'")))?;
        return Err(KioskError::Config(format!(
            "Use --force to discard {}; the check-in will never be sent",
            item.payload.summary()
        )));
    }

    let item = manager.discard(id)?;

    match format {
        OutputFormat::Json => format_item(&item, format),
        OutputFormat::Pretty => Ok(format!(
            "{} Discarded {} (ID: {})",
            "✗".red(),
            item.payload.summary(),
            item.id
        )),
    }
}

/// Remove every queued action.
///
/// # Errors
///
/// Returns `Config` without `--force`, or an error if the queue cannot be
/// written.
pub fn clear(manager: &QueueManager, force: bool, format: OutputFormat) -> Result<String, KioskError> {
    if !force {
        return Err(KioskError::Config(
            "Use --force to clear all queued actions".to_string(),
        ));
    }
    let removed = manager.clear()?;

    match format {
        OutputFormat::Json => to_json(&json!({ "cleared": removed })),
        OutputFormat::Pretty => Ok(format!("Cleared {removed} queued actions")),
    }
}

/// Render a flush report.
///
/// # Errors
///
/// Returns `KioskError::Parse` if JSON serialization fails.
pub fn render_report(report: &FlushReport, format: OutputFormat) -> Result<String, KioskError> {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Pretty => Ok(format_flush_report(report)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sync::{QueueStore, RemoteError};
    use crate::sync::testing::{Reply, ScriptedRemote};

    fn manager(script: Vec<Reply>) -> QueueManager {
        QueueManager::new(
            QueueStore::in_memory().unwrap(),
            Arc::new(ScriptedRemote::new(script)),
        )
    }

    fn args(reservation: &str) -> EnqueueArgs {
        EnqueueArgs {
            campground: "pine-lake".to_string(),
            reservation: reservation.to_string(),
            add_ons: Vec::new(),
            add_on_total: 0,
            payment_ref: None,
            guest: None,
        }
    }

    #[test]
    fn test_enqueue_json_returns_item() {
        let manager = manager(Vec::new());
        let output = enqueue(&manager, args("R-1"), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["attempt"], 0);
        assert_eq!(value["payload"]["reservation_id"], "R-1");
        assert_eq!(manager.items().unwrap().len(), 1);
    }

    #[test]
    fn test_enqueue_rejects_negative_total() {
        let manager = manager(Vec::new());
        let mut bad = args("R-1");
        bad.add_on_total = -5;
        assert!(matches!(
            enqueue(&manager, bad, OutputFormat::Pretty),
            Err(KioskError::Config(_))
        ));
        assert!(manager.items().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_offline_skips() {
        let manager = manager(Vec::new());
        enqueue(&manager, args("R-1"), OutputFormat::Pretty).unwrap();

        let output = flush(&manager, true, OutputFormat::Json).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["skipped"], "offline");
        assert_eq!(manager.items().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_and_discard_flow() {
        let conflict = Reply::Fail(RemoteError::new(Some(409), "conflict"));
        let manager = manager(vec![conflict.clone(), conflict]);
        let first = manager.enqueue(CheckInPayload::new("pine-lake", "R-1")).unwrap();
        manager.flush().await.unwrap();

        let listed = conflicts(&manager, OutputFormat::Json).unwrap();
        assert!(listed.contains(&first.id));

        retry(&manager, &first.id, OutputFormat::Pretty).await.unwrap();
        assert!(manager.get(&first.id).unwrap().unwrap().conflict);

        assert!(matches!(
            discard(&manager, &first.id, false, OutputFormat::Pretty),
            Err(KioskError::Config(_))
        ));
        discard(&manager, &first.id, true, OutputFormat::Pretty).unwrap();
        assert!(manager.items().unwrap().is_empty());
    }

    #[test]
    fn test_discard_unknown_id() {
        let manager = manager(Vec::new());
        assert!(matches!(
            discard(&manager, "nope", false, OutputFormat::Pretty),
            Err(KioskError::NotFound(_))
        ));
    }

    #[test]
    fn test_clear_requires_force() {
        let manager = manager(Vec::new());
        enqueue(&manager, args("R-1"), OutputFormat::Pretty).unwrap();

        assert!(clear(&manager, false, OutputFormat::Pretty).is_err());
        assert_eq!(
            clear(&manager, true, OutputFormat::Pretty).unwrap(),
            "Cleared 1 queued actions"
        );
    }

    #[test]
    fn test_status_pretty() {
        let manager = manager(Vec::new());
        enqueue(&manager, args("R-1"), OutputFormat::Pretty).unwrap();
        let output = status(&manager, OutputFormat::Pretty).unwrap();
        assert!(output.contains("Check-in Queue Status"));
    }
}
