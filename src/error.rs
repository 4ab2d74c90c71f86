//! Error types for kiosk-sync.

use thiserror::Error;

/// Errors surfaced by the queue, its storage, and the CLI.
///
/// Failures of individual remote check-in calls are *not* represented here:
/// a flush absorbs them into item reclassification.
#[derive(Debug, Error)]
pub enum KioskError {
    /// Invalid configuration or command-line usage.
    #[error("configuration error: {0}")]
    Config(String),

    /// The persistent store is unusable.
    #[error("database error: {0}")]
    Database(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No queue item with the given id.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested transition is not legal for the item's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The remote client could not be set up.
    #[error("remote error: {0}")]
    Remote(String),
}

impl KioskError {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::NotFound(_) => 3,
            Self::Conflict(_) => 4,
            Self::Database(_) | Self::Io(_) | Self::Parse(_) | Self::Remote(_) => 1,
        }
    }
}

impl From<rusqlite::Error> for KioskError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
