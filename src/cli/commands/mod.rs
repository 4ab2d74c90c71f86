//! Command implementations for kiosk-sync.
//!
//! This module contains the implementation of all CLI commands.

mod completions;
mod queue;
mod watch;

pub use completions::completions;
pub use queue::{clear, conflicts, discard, enqueue, flush, list, render_report, retry, status};
pub use watch::watch;
