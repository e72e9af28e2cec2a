//! SQLite storage for the bot hit ledger.
//!
//! Owns the `bot_records` table: atomic activity upserts, unblocking,
//! retention cleanup, dashboard aggregates, and the one-time import of
//! legacy table shapes.

mod db;
mod legacy;
mod models;
mod queries;
mod queries_stats;

#[cfg(test)]
mod tests;

pub use db::{DatabaseError, LedgerDatabase};
pub use legacy::LegacyImport;
pub use models::*;
pub use queries::ActivityParams;
