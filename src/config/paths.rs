//! Path resolution for kiosk-sync configuration and data files.
//!
//! All kiosk-sync data is stored in `~/.kiosk-sync/` unless `KIOSK_SYNC_HOME`
//! points elsewhere:
//! - `config.yaml` - Main configuration file
//! - `kiosk-sync.db` - SQLite database holding the pending-action slot

use std::path::PathBuf;

use crate::error::KioskError;

/// Environment variable overriding the data root.
pub const HOME_ENV: &str = "KIOSK_SYNC_HOME";

/// Paths to kiosk-sync configuration and data.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.kiosk-sync/`
    pub root: PathBuf,
    /// Config file: `~/.kiosk-sync/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.kiosk-sync/kiosk-sync.db`
    pub database: PathBuf,
}

impl Paths {
    /// Resolve paths from `KIOSK_SYNC_HOME`, falling back to `$HOME/.kiosk-sync`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither variable is set.
    pub fn new() -> Result<Self, KioskError> {
        if let Ok(root) = std::env::var(HOME_ENV) {
            if !root.is_empty() {
                return Ok(Self::with_root(PathBuf::from(root)));
            }
        }

        let home = std::env::var("HOME").map_err(|_| {
            KioskError::Config("Could not determine home directory".to_string())
        })?;

        Ok(Self::with_root(PathBuf::from(home).join(".kiosk-sync")))
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("kiosk-sync.db"),
            root,
        }
    }

    /// Ensure the root directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), KioskError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                KioskError::Config(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }
        Ok(())
    }
}
