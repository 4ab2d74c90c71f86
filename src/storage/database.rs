//! `SQLite` database connection and slot operations.
//!
//! The database is stored at `~/.kiosk-sync/kiosk-sync.db` and holds named
//! key-value slots. Each slot value is replaced whole on every write.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::KioskError;

use super::migrations;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at a specific path.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &std::path::Path) -> Result<Self, KioskError> {
        let conn = Connection::open(path).map_err(|e| {
            KioskError::Database(format!("Failed to open database {}: {e}", path.display()))
        })?;

        // Enable write-ahead logging
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| KioskError::Database(format!("Failed to enable WAL: {e}")))?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, KioskError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            KioskError::Database(format!("Failed to open in-memory database: {e}"))
        })?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Run database migrations.
    fn migrate(&self) -> Result<(), KioskError> {
        migrations::run(&self.conn)
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, KioskError> {
        migrations::get_version(&self.conn)
    }

    /// Read the raw value of a slot, or `None` if it was never written.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn read_slot(&self, name: &str) -> Result<Option<String>, KioskError> {
        self.conn
            .query_row(
                "SELECT value FROM kv_slots WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| KioskError::Database(format!("Failed to read slot {name}: {e}")))
    }

    /// Replace the value of a slot in a single statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write_slot(&self, name: &str, value: &str) -> Result<(), KioskError> {
        self.conn
            .execute(
                r"INSERT INTO kv_slots (name, value, updated_at) VALUES (?1, ?2, ?3)
                  ON CONFLICT(name) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at",
                params![name, value, Utc::now().to_rfc3339()],
            )
            .map_err(|e| KioskError::Database(format!("Failed to write slot {name}: {e}")))?;

        Ok(())
    }

    /// Remove a slot. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_slot(&self, name: &str) -> Result<bool, KioskError> {
        let rows = self
            .conn
            .execute("DELETE FROM kv_slots WHERE name = ?1", [name])
            .map_err(|e| KioskError::Database(format!("Failed to delete slot {name}: {e}")))?;

        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.schema_version().unwrap() > 0);
    }

    #[test]
    fn test_open_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::open_at(&db_path).unwrap();
        assert!(db.schema_version().unwrap() > 0);
        assert!(db_path.exists());
    }

    #[test]
    fn test_slot_roundtrip_and_replace() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.read_slot("a").unwrap(), None);

        db.write_slot("a", "first").unwrap();
        db.write_slot("a", "second").unwrap();
        assert_eq!(db.read_slot("a").unwrap().as_deref(), Some("second"));

        assert!(db.delete_slot("a").unwrap());
        assert!(!db.delete_slot("a").unwrap());
        assert_eq!(db.read_slot("a").unwrap(), None);
    }

    #[test]
    fn test_slot_survives_reopen() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let db = Database::open_at(&db_path).unwrap();
            db.write_slot("queue", "[1,2,3]").unwrap();
        }

        {
            let db = Database::open_at(&db_path).unwrap();
            assert_eq!(db.read_slot("queue").unwrap().as_deref(), Some("[1,2,3]"));
        }
    }
}
