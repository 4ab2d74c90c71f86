use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::sync::{ActionPayload, QueueItem, QueueStats};

/// Describe how long ago `then` was, relative to `now`.
pub fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(then);
    if age.num_days() > 0 {
        format!("{} days ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{} hours ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{} minutes ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

fn format_due(next: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let wait = next.signed_duration_since(now);
    if wait.num_seconds() <= 0 {
        "due now".to_string()
    } else if wait.num_minutes() > 0 {
        format!("retry in {}m", wait.num_minutes())
    } else {
        format!("retry in {}s", wait.num_seconds())
    }
}

fn shorten(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// Format a list of queue items as a pretty table
pub fn format_items_pretty(items: &[QueueItem], title: &str, now: DateTime<Utc>) -> String {
    if items.is_empty() {
        return format!("{title} (0 items)\n  No queued actions");
    }

    let mut output = format!("{} ({} items)\n", title, items.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for item in items {
        let (icon, state) = if item.conflict {
            ("✗".red(), "needs decision".red())
        } else if item.attempt > 0 {
            ("↻".yellow(), format_due(item.next_attempt_at, now).yellow())
        } else {
            ("⏳".normal(), format_due(item.next_attempt_at, now).normal())
        };

        output.push_str(&format!(
            "{} {}  {}",
            icon,
            item.payload.summary().bold(),
            state
        ));
        if item.attempt > 0 {
            output.push_str(&format!("  {}", format!("attempt {}", item.attempt).dimmed()));
        }
        output.push('\n');

        output.push_str(&format!("    {}\n", item.id.dimmed()));
        if let Some(error) = &item.last_error {
            output.push_str(&format!("    {}\n", shorten(error, 60).red()));
        }
    }

    output
}

/// Format a single queue item as pretty output
pub fn format_item_pretty(item: &QueueItem) -> String {
    let mut output = format!("{}\n", item.payload.summary().bold());
    output.push_str(&format!("  {}: {}\n", "ID".dimmed(), item.id));
    output.push_str(&format!("  {}: {}\n", "Action".dimmed(), item.payload));

    match &item.payload {
        ActionPayload::CompleteCheckIn(p) => {
            output.push_str(&format!("  {}: {}\n", "Campground".dimmed(), p.campground_id));
            if !p.add_on_ids.is_empty() {
                output.push_str(&format!(
                    "  {}: {} ({} cents)\n",
                    "Add-ons".dimmed(),
                    p.add_on_ids.join(", "),
                    p.add_on_total_cents
                ));
            }
        },
    }

    output.push_str(&format!("  {}: {}\n", "Attempts".dimmed(), item.attempt));
    if let Some(error) = &item.last_error {
        output.push_str(&format!("  {}: {}\n", "Last error".dimmed(), error.red()));
    }
    output.push_str(&format!(
        "  {}: {}\n",
        "Created".dimmed(),
        item.created_at.format("%Y-%m-%d %H:%M")
    ));

    output
}

/// Format queue counts as pretty output
pub fn format_stats_pretty(stats: &QueueStats, now: DateTime<Utc>) -> String {
    let mut lines = Vec::new();

    lines.push("Check-in Queue Status".bold().to_string());
    lines.push("─".repeat(40));

    lines.push(format!(
        "  Pending:    {} {}",
        stats.pending,
        if stats.due > 0 {
            format!("({} due now)", stats.due).dimmed()
        } else {
            "".dimmed()
        }
    ));

    lines.push(format!(
        "  Conflicts:  {} {}",
        stats.conflicted,
        if stats.conflicted > 0 {
            "actions need attention".red()
        } else {
            "".normal()
        }
    ));

    if let Some(oldest) = stats.oldest {
        lines.push(format!("  Oldest:     {}", format_age(oldest, now).dimmed()));
    }

    if let Some(next) = stats.next_attempt_at {
        lines.push(format!("  Next retry: {}", format_due(next, now).dimmed()));
    }

    if stats.conflicted > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'kiosk-sync conflicts' to review conflicted actions"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}
