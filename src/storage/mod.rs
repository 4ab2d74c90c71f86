//! Storage layer for kiosk-sync.
//!
//! SQLite-backed named slots. The only slot in use holds the pending-action
//! queue.

mod database;
mod migrations;

pub use database::Database;
