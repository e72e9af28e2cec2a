//! Configuration resolution for BotLedger.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/botledger/settings.json)
//! 3. Explicit config file (--config)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete BotLedger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite database file. `None` falls back to [`database_path`].
    pub database_path: Option<PathBuf>,
    /// Records not seen for this many days are removed by cleanup.
    pub retention_days: u32,
    /// Lifetime of a cached "blocked" fast-path entry (seconds).
    pub cache_ttl_secs: u64,
    /// Label stored when a bot is blocked without an explicit reason.
    pub default_block_reason: String,
    /// Number of rows in the stats `top_blocked_ips` list.
    pub top_blocked_limit: u32,
    /// Interval between retention sweeps in `botledger sweep` (seconds).
    pub cleanup_interval_secs: u64,
    /// Include underlying error text in operator-facing messages.
    pub debug: bool,
    pub log_level: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            retention_days: 30,
            cache_ttl_secs: 24 * 60 * 60, // 1 day
            default_block_reason: "bot-activity".to_string(),
            top_blocked_limit: 10,
            cleanup_interval_secs: 24 * 60 * 60,
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Database path, falling back to the platform default.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(database_path)
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<LedgerConfig> {
    let mut config = LedgerConfig::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file {} does not exist",
                path.display()
            )));
        }
        config = load_config_file(path)?;
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

/// Get the default database path.
pub fn database_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("ledger.db"))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".botledger"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/botledger"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("botledger"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<LedgerConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Apply `BOTLEDGER_*` overrides. Unparseable values are ignored.
fn apply_env_overrides(config: &mut LedgerConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("BOTLEDGER_DB_PATH") {
        config.database_path = Some(PathBuf::from(val));
    }
    if let Some(n) = var("BOTLEDGER_RETENTION_DAYS").and_then(|v| v.parse().ok()) {
        config.retention_days = n;
    }
    if let Some(n) = var("BOTLEDGER_CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
        config.cache_ttl_secs = n;
    }
    if let Some(val) = var("BOTLEDGER_DEBUG") {
        config.debug = matches!(val.as_str(), "1" | "true" | "yes");
    }
    if let Some(val) = var("BOTLEDGER_LOG_LEVEL") {
        config.log_level = val;
    }
}
