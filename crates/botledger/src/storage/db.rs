//! Database connection and initialization.

pub use botledger_core::db::DatabaseError;

botledger_core::define_database!(LedgerDatabase, "Ledger database migrations complete");
