//! Error types for `BotLedger` core library.

use thiserror::Error;

/// Result type alias using `BotLedger` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `BotLedger` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Address is not a valid IPv4 or IPv6 literal
    #[error("Invalid IP address: {0:?}")]
    InvalidAddress(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
