//! The bot hit ledger.
//!
//! [`Ledger`] is the only writer of `bot_records`. It validates addresses,
//! keeps the block cache in step with the table, and applies the
//! soft-fail-to-zero policy for dashboard statistics.

mod error;


use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use botledger_core::LedgerConfig;
use botledger_core::db::{DatabaseError, SECS_PER_DAY, unix_timestamp};
#[cfg(feature = "metrics")]
use botledger_core::metrics::LedgerMetrics;

use crate::cache::{BlockCache, block_cache_key};
use crate::storage::{ActivityParams, BotRecord, LedgerDatabase, LegacyImport, Stats};

pub use error::LedgerError;

/// One request observation reported by the classifier.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub ip_address: &'a str,
    pub user_agent: Option<&'a str>,
    pub request_uri: Option<&'a str>,
    pub classified_as_bot: bool,
    /// Ignored unless `classified_as_bot`; falls back to the configured label.
    pub reason: Option<&'a str>,
}

/// Tunables the ledger reads from [`LedgerConfig`].
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub cache_ttl: Duration,
    pub default_block_reason: String,
    pub top_blocked_limit: u32,
}

impl From<&LedgerConfig> for LedgerSettings {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            default_block_reason: config.default_block_reason.clone(),
            top_blocked_limit: config.top_blocked_limit,
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

/// Record store and decision API for per-address bot activity.
pub struct Ledger {
    db: LedgerDatabase,
    cache: Arc<dyn BlockCache>,
    settings: LedgerSettings,
    #[cfg(feature = "metrics")]
    metrics: LedgerMetrics,
}

fn parse(ip_address: &str) -> Result<IpAddr, LedgerError> {
    botledger_core::parse_ip(ip_address)
        .map_err(|_| LedgerError::InvalidAddress(ip_address.to_string()))
}

impl Ledger {
    pub fn new(db: LedgerDatabase, cache: Arc<dyn BlockCache>, settings: LedgerSettings) -> Self {
        Self {
            db,
            cache,
            settings,
            #[cfg(feature = "metrics")]
            metrics: LedgerMetrics::new(),
        }
    }

    pub const fn database(&self) -> &LedgerDatabase {
        &self.db
    }

    // =========================================================================
    // Dashboard reads
    // =========================================================================

    /// Blocked-address statistics for the dashboard.
    ///
    /// Never fails: a store error is logged and reported as all zeros.
    pub async fn stats(&self) -> Stats {
        match self
            .db
            .blocked_stats(unix_timestamp(), self.settings.top_blocked_limit)
            .await
        {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Stats query failed, serving zero stats");
                Stats::default()
            }
        }
    }

    /// Currently blocked records, most recently seen first.
    pub async fn list_blocked(&self, limit: u32) -> Result<Vec<BotRecord>, LedgerError> {
        Ok(self.db.list_blocked(limit).await?)
    }

    /// Records seen within the last `days` days, blocked or not.
    pub async fn recent_activity(
        &self,
        days: u32,
        limit: u32,
    ) -> Result<Vec<BotRecord>, LedgerError> {
        let since = unix_timestamp() - i64::from(days) * SECS_PER_DAY;
        Ok(self.db.list_recent(since, limit).await?)
    }

    pub async fn get_record(&self, ip_address: &str) -> Result<Option<BotRecord>, LedgerError> {
        let ip = parse(ip_address)?;
        match self.db.get_record(&ip.to_string()).await {
            Ok(record) => Ok(Some(record)),
            Err(DatabaseError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fast-path blocking decision.
    ///
    /// A cached marker answers without touching the store; otherwise the
    /// record is consulted and a blocked result primes the cache.
    pub async fn is_blocked(&self, ip_address: &str) -> Result<bool, LedgerError> {
        let ip = parse(ip_address)?;
        let key = block_cache_key(&ip);
        if self.cache.contains(&key) {
            return Ok(true);
        }

        match self.db.get_record(&ip.to_string()).await {
            Ok(record) if record.is_blocked => {
                self.prime_cache(&ip).await;
                Ok(true)
            }
            Ok(_) | Err(DatabaseError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert the blocked marker for `ip`, then confirm the row is still
    /// blocked and drop the marker if it is not.
    ///
    /// An [`unblock`](Self::unblock) that lands between our store read and
    /// the insert is caught by the re-read; one that lands after the re-read
    /// removes the marker itself.
    async fn prime_cache(&self, ip: &IpAddr) {
        let key = block_cache_key(ip);
        self.cache.insert(key.clone(), self.settings.cache_ttl);

        let still_blocked = match self.db.get_record(&ip.to_string()).await {
            Ok(record) => record.is_blocked,
            Err(DatabaseError::NotFound(_)) => false,
            Err(e) => {
                warn!(ip = %ip, error = %e, "Could not confirm block, dropping cached marker");
                false
            }
        };
        if !still_blocked {
            debug!(ip = %ip, "Block cleared while priming cache");
            self.cache.remove(&key);
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Record one observation for an address.
    ///
    /// The hit increment and any block are applied in a single upsert, so
    /// concurrent observations of the same address never lose hits. Only an
    /// observation that blocks primes the cache; a clean observation of an
    /// already blocked address leaves the marker to [`is_blocked`](Self::is_blocked).
    pub async fn record_activity(&self, obs: &Observation<'_>) -> Result<BotRecord, LedgerError> {
        let ip = parse(obs.ip_address)?;
        let canonical = ip.to_string();
        let block_reason = obs.classified_as_bot.then(|| {
            obs.reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or(self.settings.default_block_reason.as_str())
        });

        let record = self
            .db
            .upsert_activity(
                &ActivityParams {
                    ip_address: &canonical,
                    user_agent: obs.user_agent,
                    request_uri: obs.request_uri,
                    block_reason,
                },
                unix_timestamp(),
            )
            .await?;

        if let Some(reason) = block_reason {
            self.prime_cache(&ip).await;
            info!(ip = %canonical, reason, hits = record.hits, "Address blocked");
        } else {
            debug!(ip = %canonical, hits = record.hits, "Activity recorded");
        }

        #[cfg(feature = "metrics")]
        self.metrics.record_activity(obs.classified_as_bot);

        Ok(record)
    }

    /// Clear the block on an address and drop its cached marker.
    ///
    /// The marker is dropped whether or not the row exists, so a stale
    /// fast-path entry can never outlive an unblock attempt.
    pub async fn unblock(&self, ip_address: &str) -> Result<(), LedgerError> {
        let ip = parse(ip_address)?;
        let canonical = ip.to_string();

        let updated = self.db.unblock(&canonical).await;
        self.cache.remove(&block_cache_key(&ip));

        if !updated? {
            return Err(LedgerError::NotFound(canonical));
        }

        info!(ip = %canonical, "Address unblocked");
        #[cfg(feature = "metrics")]
        self.metrics.record_unblock();
        Ok(())
    }

    /// Delete records not seen for `retention_days` days, blocked or not,
    /// and purge expired cache markers.
    pub async fn cleanup(&self, retention_days: u32) -> Result<u64, LedgerError> {
        let purged = self.cache.purge_expired();
        let removed = self.db.delete_stale(retention_days, unix_timestamp()).await?;

        info!(removed, purged, retention_days, "Ledger cleanup complete");
        #[cfg(feature = "metrics")]
        self.metrics.record_cleanup(removed);
        Ok(removed)
    }

    /// Fold a legacy table shape into the canonical table.
    pub async fn import_legacy(&self, table: &str) -> Result<LegacyImport, LedgerError> {
        Ok(self.db.import_legacy(table, unix_timestamp()).await?)
    }
}
