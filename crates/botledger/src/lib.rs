//! BotLedger Library
//!
//! Per-address bot hit accounting and blocking state:
//! - SQLite storage for hit records, with atomic upserts
//! - Fast-path block cache kept in step with the table
//! - Ledger service: record, unblock, cleanup, dashboard stats
//! - Admin surface: token and privilege checks, response mapping

pub mod admin;
pub mod cache;
pub mod ledger;
pub mod storage;

pub use ledger::{Ledger, LedgerError, LedgerSettings, Observation};
