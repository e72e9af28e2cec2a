//! Operator-facing surface over the ledger.
//!
//! Transport-neutral: an HTTP layer hands over the acting principal, the
//! submitted token and the form input, and sends back the returned
//! [`AdminResponse`]. Authorization is checked here, before the ledger is
//! called; the ledger itself trusts its callers.

mod token;


use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, warn};

use botledger_core::db::unix_timestamp;

use crate::ledger::{Ledger, LedgerError};

pub use token::{ActionTokens, AdminAction, TOKEN_WINDOW_SECS};

/// The authenticated user behind a request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub name: String,
    /// Holds the administrative capability.
    pub is_admin: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Token or privilege check failed; the ledger was never called.
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("IP address is required")]
    MissingAddress,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl AdminError {
    /// HTTP-equivalent status code.
    pub const fn status(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 403,
            Self::MissingAddress | Self::Ledger(LedgerError::InvalidAddress(_)) => 400,
            Self::Ledger(LedgerError::NotFound(_)) => 404,
            Self::Ledger(LedgerError::StoreUnavailable(_)) => 503,
            Self::Encode(_) => 500,
        }
    }

    /// Operator-visible message. Backend detail is appended only in debug.
    pub fn public_message(&self, debug: bool) -> String {
        match self {
            Self::Unauthorized(_) | Self::MissingAddress => self.to_string(),
            Self::Ledger(LedgerError::InvalidAddress(_)) => "Invalid IP address format".to_string(),
            Self::Ledger(LedgerError::NotFound(_)) => {
                "IP address not found in the block list".to_string()
            }
            Self::Ledger(e @ LedgerError::StoreUnavailable(_)) => {
                if debug {
                    format!("Database error: {e}")
                } else {
                    "Database error".to_string()
                }
            }
            Self::Encode(_) => "Internal error".to_string(),
        }
    }
}

/// `{ "success": bool, "data": ... }` body plus a status for the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminResponse {
    pub success: bool,
    #[serde(skip)]
    pub status: u16,
    pub data: Value,
}

impl AdminResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            status: 200,
            data,
        }
    }

    pub fn error(err: &AdminError, debug: bool) -> Self {
        Self {
            success: false,
            status: err.status(),
            data: Value::String(err.public_message(debug)),
        }
    }
}

/// Authorization gate and response mapping for dashboard operations.
pub struct AdminSurface {
    ledger: Arc<Ledger>,
    tokens: ActionTokens,
    debug: bool,
}

impl AdminSurface {
    pub const fn new(ledger: Arc<Ledger>, tokens: ActionTokens, debug: bool) -> Self {
        Self {
            ledger,
            tokens,
            debug,
        }
    }

    /// Token the dashboard page embeds for `action`.
    pub fn issue_token(&self, action: AdminAction, principal: &Principal) -> String {
        self.tokens.issue(action, &principal.name, unix_timestamp())
    }

    fn authorize(
        &self,
        action: AdminAction,
        principal: &Principal,
        token: &str,
    ) -> Result<(), AdminError> {
        if !self
            .tokens
            .verify(token, action, &principal.name, unix_timestamp())
        {
            warn!(principal = %principal.name, action = action.as_str(), "Rejected invalid token");
            return Err(AdminError::Unauthorized("Invalid token"));
        }
        if !principal.is_admin {
            warn!(principal = %principal.name, action = action.as_str(), "Rejected non-admin principal");
            return Err(AdminError::Unauthorized("Insufficient permissions"));
        }
        Ok(())
    }

    fn respond(&self, result: Result<Value, AdminError>) -> AdminResponse {
        match result {
            Ok(data) => AdminResponse::ok(data),
            Err(e) => {
                if e.status() >= 500 {
                    error!(error = %e, "Dashboard request failed");
                }
                AdminResponse::error(&e, self.debug)
            }
        }
    }

    /// Dashboard statistics.
    pub async fn stats(&self, principal: &Principal, token: &str) -> AdminResponse {
        let result = async {
            self.authorize(AdminAction::Stats, principal, token)?;
            Ok::<_, AdminError>(serde_json::to_value(self.ledger.stats().await)?)
        }
        .await;
        self.respond(result)
    }

    /// Unblock the submitted address.
    pub async fn unblock(
        &self,
        principal: &Principal,
        token: &str,
        ip: Option<&str>,
    ) -> AdminResponse {
        let result = async {
            self.authorize(AdminAction::Unblock, principal, token)?;
            let ip = ip
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .ok_or(AdminError::MissingAddress)?;
            self.ledger.unblock(ip).await?;
            Ok::<_, AdminError>(json!("IP unblocked successfully"))
        }
        .await;
        self.respond(result)
    }
}
