//! Flush pass results and their display.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

/// What caused a flush pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushTrigger {
    /// Explicit request from a caller.
    Manual,
    /// Connectivity came back.
    Reconnect,
    /// Periodic retry timer.
    Timer,
    /// The background worker asked for a sync.
    WorkerSignal,
    /// An operator re-armed a conflicted item.
    OperatorRetry,
}

impl FlushTrigger {
    /// Worker signals may carry fresher connectivity information than ours.
    #[must_use]
    pub const fn bypasses_connectivity(self) -> bool {
        matches!(self, Self::WorkerSignal)
    }
}

/// Why a flush pass did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another pass was already running.
    InProgress,
    /// Connectivity is known to be down.
    Offline,
}

/// Result of executing one due item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Rescheduled { next_attempt_at: DateTime<Utc> },
    Conflicted,
    /// Transient failures used up the attempt budget.
    Exhausted,
}

/// One executed item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub id: String,
    pub summary: String,
    pub attempt: u32,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub error: Option<String>,
}

/// Summary of a flush pass.
#[derive(Debug, Clone, Serialize)]
pub struct FlushReport {
    pub trigger: FlushTrigger,
    /// Set when the pass returned without executing anything.
    pub skipped: Option<SkipReason>,
    pub succeeded: usize,
    pub rescheduled: usize,
    pub conflicted: usize,
    pub results: Vec<ItemOutcome>,
}

impl FlushReport {
    #[must_use]
    pub const fn new(trigger: FlushTrigger) -> Self {
        Self {
            trigger,
            skipped: None,
            succeeded: 0,
            rescheduled: 0,
            conflicted: 0,
            results: Vec::new(),
        }
    }

    #[must_use]
    pub const fn skipped(trigger: FlushTrigger, reason: SkipReason) -> Self {
        let mut report = Self::new(trigger);
        report.skipped = Some(reason);
        report
    }

    /// Record an item's outcome.
    pub fn add(&mut self, result: ItemOutcome) {
        match result.outcome {
            Outcome::Succeeded => self.succeeded += 1,
            Outcome::Rescheduled { .. } => self.rescheduled += 1,
            Outcome::Conflicted | Outcome::Exhausted => self.conflicted += 1,
        }
        self.results.push(result);
    }

    /// Number of remote calls made.
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.succeeded + self.rescheduled + self.conflicted
    }

    #[must_use]
    pub const fn was_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Format a flush report for display.
#[must_use]
pub fn format_flush_report(report: &FlushReport) -> String {
    match report.skipped {
        Some(SkipReason::InProgress) => {
            return "Flush already in progress; nothing to do.".dimmed().to_string();
        },
        Some(SkipReason::Offline) => {
            return format!(
                "{} offline, queued actions will be sent when connectivity returns",
                "○".yellow()
            );
        },
        None => {},
    }

    if report.attempted() == 0 {
        return "No queued actions are due.".to_string();
    }

    let mut lines = Vec::new();

    lines.push(format!("Flush completed: {} actions", report.attempted()));
    lines.push("─".repeat(40));

    if report.succeeded > 0 {
        lines.push(format!(
            "  {} {}",
            "✓".green(),
            format!("{} succeeded", report.succeeded).green()
        ));
    }

    if report.rescheduled > 0 {
        lines.push(format!(
            "  {} {}",
            "↻".yellow(),
            format!("{} rescheduled", report.rescheduled).yellow()
        ));
    }

    if report.conflicted > 0 {
        lines.push(format!(
            "  {} {}",
            "✗".red(),
            format!("{} need operator attention", report.conflicted).red()
        ));
    }

    let errors: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.error.is_some())
        .take(3)
        .collect();

    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        for err in errors {
            lines.push(format!(
                "  - {}: {}",
                err.summary,
                err.error.as_deref().unwrap_or("Unknown error")
            ));
        }
    }

    lines.join("\n")
}
