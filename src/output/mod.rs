//! Output formatting for kiosk-sync.
//!
//! This module provides formatters for displaying queue state in various formats.

mod json;
mod pretty;

use chrono::{DateTime, Utc};

use crate::cli::args::OutputFormat;
use crate::error::KioskError;
use crate::sync::{QueueItem, QueueStats};

pub use json::*;
pub use pretty::*;

/// Format queue items based on output format
///
/// # Errors
///
/// Returns `KioskError::Parse` if JSON serialization fails.
pub fn format_items(
    items: &[QueueItem],
    title: &str,
    format: OutputFormat,
    now: DateTime<Utc>,
) -> Result<String, KioskError> {
    match format {
        OutputFormat::Pretty => Ok(format_items_pretty(items, title, now)),
        OutputFormat::Json => format_items_json(items, title),
    }
}

/// Format a single queue item based on output format
///
/// # Errors
///
/// Returns `KioskError::Parse` if JSON serialization fails.
pub fn format_item(item: &QueueItem, format: OutputFormat) -> Result<String, KioskError> {
    match format {
        OutputFormat::Pretty => Ok(format_item_pretty(item)),
        OutputFormat::Json => to_json(item),
    }
}

/// Format queue counts based on output format
///
/// # Errors
///
/// Returns `KioskError::Parse` if JSON serialization fails.
pub fn format_stats(
    stats: &QueueStats,
    format: OutputFormat,
    now: DateTime<Utc>,
) -> Result<String, KioskError> {
    match format {
        OutputFormat::Pretty => Ok(format_stats_pretty(stats, now)),
        OutputFormat::Json => format_stats_json(stats),
    }
}
