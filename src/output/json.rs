//! JSON output formatting for kiosk-sync.

use serde::Serialize;
use serde_json::json;

use crate::error::KioskError;
use crate::sync::{QueueItem, QueueStats};

/// Format queue items as JSON
///
/// # Errors
///
/// Returns `KioskError::Parse` if JSON serialization fails.
pub fn format_items_json(items: &[QueueItem], list_name: &str) -> Result<String, KioskError> {
    let output = json!({
        "list": list_name,
        "count": items.len(),
        "items": items
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format queue counts as JSON
///
/// # Errors
///
/// Returns `KioskError::Parse` if JSON serialization fails.
pub fn format_stats_json(stats: &QueueStats) -> Result<String, KioskError> {
    let output = json!({
        "pending": stats.pending,
        "due": stats.due,
        "conflicted": stats.conflicted,
        "oldest": stats.oldest.map(|t| t.to_rfc3339()),
        "next_attempt_at": stats.next_attempt_at.map(|t| t.to_rfc3339()),
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `KioskError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, KioskError> {
    Ok(serde_json::to_string_pretty(value)?)
}
