//! Anti-forgery tokens scoped to an action and a principal.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of one token window. A token stays valid for the window it was
/// issued in and the next one.
pub const TOKEN_WINDOW_SECS: i64 = 12 * 60 * 60;

/// Operator actions that require a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Stats,
    Unblock,
}

impl AdminAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stats => "bot_stats",
            Self::Unblock => "bot_unblock",
        }
    }
}

/// Issues and verifies tokens with a server-side secret.
pub struct ActionTokens {
    secret: Vec<u8>,
}

impl ActionTokens {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Token for `action` by `principal` at time `now`.
    pub fn issue(&self, action: AdminAction, principal: &str, now: i64) -> String {
        self.token_for_window(action, principal, now.div_euclid(TOKEN_WINDOW_SECS))
    }

    /// Whether `token` was issued for this action and principal in the
    /// current or the previous window.
    pub fn verify(&self, token: &str, action: AdminAction, principal: &str, now: i64) -> bool {
        let window = now.div_euclid(TOKEN_WINDOW_SECS);
        [window, window - 1].into_iter().any(|w| {
            token
                .as_bytes()
                .ct_eq(self.token_for_window(action, principal, w).as_bytes())
                .into()
        })
    }

    fn token_for_window(&self, action: AdminAction, principal: &str, window: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update([0]);
        hasher.update(action.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(principal.as_bytes());
        hasher.update([0]);
        hasher.update(window.to_be_bytes());
        hex::encode(hasher.finalize())
    }
}
