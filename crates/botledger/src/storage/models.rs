//! Data models for ledger storage.

use serde::{Deserialize, Serialize};

/// Display width for user agents on the dashboard.
pub const USER_AGENT_DISPLAY_CHARS: usize = 100;
/// Display width for request URIs on the dashboard.
pub const REQUEST_URI_DISPLAY_CHARS: usize = 50;

/// One row per distinct client address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BotRecord {
    pub ip_address: String,
    pub hits: i64,
    pub is_blocked: bool,
    /// Retained after unblock for history. Use [`BotRecord::active_block_reason`]
    /// when presenting.
    pub block_reason: Option<String>,
    pub user_agent: Option<String>,
    pub request_uri: Option<String>,
    pub first_seen: i64,
    pub last_seen: i64,
}

impl BotRecord {
    /// The block reason, only while the record is actually blocked.
    pub fn active_block_reason(&self) -> Option<&str> {
        if self.is_blocked {
            self.block_reason.as_deref()
        } else {
            None
        }
    }

    /// Reason label for display, `"Unknown"` when blocked without one.
    pub fn display_reason(&self) -> &str {
        self.active_block_reason().unwrap_or("Unknown")
    }

    pub fn display_user_agent(&self) -> Option<String> {
        self.user_agent
            .as_deref()
            .map(|ua| truncate_for_display(ua, USER_AGENT_DISPLAY_CHARS))
    }

    pub fn display_request_uri(&self) -> Option<String> {
        self.request_uri
            .as_deref()
            .map(|uri| truncate_for_display(uri, REQUEST_URI_DISPLAY_CHARS))
    }
}

/// Summed hits for one blocked address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TopBlockedIp {
    pub ip_address: String,
    pub hits: i64,
}

/// Dashboard aggregates. `Default` is the zero value served when the
/// store cannot be read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_blocked: i64,
    pub today_blocked: i64,
    pub week_blocked: i64,
    pub top_blocked_ips: Vec<TopBlockedIp>,
}

/// Truncate on a char boundary, appending `...` when anything was cut.
pub fn truncate_for_display(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}
