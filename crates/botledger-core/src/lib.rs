//! `BotLedger` Core Library
//!
//! Shared functionality for `BotLedger` components:
//! - Configuration resolution and hierarchy
//! - Canonical IP address parsing
//! - `SQLite` pool helpers and timestamps
//! - Common error types

pub mod addr;
pub mod config;
pub mod db;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod tracing_init;

pub use addr::{canonical_ip, parse_ip};
pub use config::LedgerConfig;
pub use error::{Error, Result};
