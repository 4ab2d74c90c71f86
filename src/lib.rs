//! kiosk-sync - offline check-in queue for campground kiosks
//!
//! This crate keeps guest check-ins that a kiosk captured without
//! connectivity in a durable local queue, and delivers them to the
//! reservation service with backoff, idempotency keys, and conflict
//! quarantine once the service is reachable.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod storage;
pub mod sync;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::KioskError;
pub use sync::{QueueManager, QueueStore};
