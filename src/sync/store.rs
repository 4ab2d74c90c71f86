//! Durable storage for the pending-action queue.
//!
//! The whole queue lives in one named slot as a JSON array. Every mutation is
//! a read-modify-write of the entire list through [`QueueStore::load`] and
//! [`QueueStore::save`]; there is no per-item upsert.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use super::item::QueueItem;
use crate::error::KioskError;
use crate::storage::Database;

/// Slot holding the pending-action queue.
pub const QUEUE_SLOT: &str = "kiosk.pending_actions";

/// Persisted, ordered list of pending actions.
pub struct QueueStore {
    db: Mutex<Database>,
    slot: String,
}

impl QueueStore {
    /// Create a store over an open database, using the default slot.
    #[must_use]
    pub fn with_database(db: Database) -> Self {
        Self::with_slot(db, QUEUE_SLOT)
    }

    /// Create a store over an open database and a custom slot name.
    #[must_use]
    pub fn with_slot(db: Database, slot: impl Into<String>) -> Self {
        Self {
            db: Mutex::new(db),
            slot: slot.into(),
        }
    }

    /// Open a store backed by an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn in_memory() -> Result<Self, KioskError> {
        Ok(Self::with_database(Database::open_in_memory()?))
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>, KioskError> {
        self.db
            .lock()
            .map_err(|_| KioskError::Database("queue store lock poisoned".to_string()))
    }

    /// Load every persisted item.
    ///
    /// An absent, empty, or unparseable slot loads as an empty queue.
    ///
    /// # Errors
    ///
    /// Returns an error only if the database itself cannot be read.
    pub fn load(&self) -> Result<Vec<QueueItem>, KioskError> {
        self.load_locked(&*self.db()?)
    }

    /// Replace the persisted list with `items`.
    ///
    /// # Errors
    ///
    /// Returns an error if the items cannot be serialized or written.
    pub fn save(&self, items: &[QueueItem]) -> Result<(), KioskError> {
        self.save_locked(&*self.db()?, items)
    }

    /// Run a read-modify-write against the current contents.
    ///
    /// The store lock is held for the whole closure, so concurrent callers of
    /// `update` never interleave between the read and the write.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read or written.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut Vec<QueueItem>) -> T,
    ) -> Result<T, KioskError> {
        let db = self.db()?;
        let mut items = self.load_locked(&db)?;
        let out = f(&mut items);
        self.save_locked(&db, &items)?;
        Ok(out)
    }

    /// Drop the slot entirely, returning how many items it held.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear(&self) -> Result<usize, KioskError> {
        let db = self.db()?;
        let removed = self.load_locked(&db)?.len();
        db.delete_slot(&self.slot)?;
        Ok(removed)
    }

    fn load_locked(&self, db: &Database) -> Result<Vec<QueueItem>, KioskError> {
        let raw = db.read_slot(&self.slot)?;
        Ok(raw.map(|raw| decode(&raw, &self.slot)).unwrap_or_default())
    }

    fn save_locked(&self, db: &Database, items: &[QueueItem]) -> Result<(), KioskError> {
        let raw = serde_json::to_string(items)?;
        db.write_slot(&self.slot, &raw)
    }
}

fn decode(raw: &str, slot: &str) -> Vec<QueueItem> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<QueueItem>>(raw) {
        Ok(items) => dedup_by_id(items),
        Err(e) => {
            tracing::warn!(slot, error = %e, "discarding unreadable queue contents");
            Vec::new()
        }
    }
}

/// Keep the first occurrence of every id.
fn dedup_by_id(items: Vec<QueueItem>) -> Vec<QueueItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}
