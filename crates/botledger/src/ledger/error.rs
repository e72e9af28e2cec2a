//! Ledger error taxonomy.

use botledger_core::db::DatabaseError;

/// Errors returned by [`super::Ledger`] operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Input is not an IPv4/IPv6 literal. Caller error, do not retry.
    #[error("Invalid IP address: {0:?}")]
    InvalidAddress(String),

    /// No record for the address. Caller error, do not retry.
    #[error("No record for {0}")]
    NotFound(String),

    /// The store failed. Transient; safe to retry with backoff.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] DatabaseError),
}

impl LedgerError {
    /// Whether retrying the same call could succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
