//! Write-path queries for the ledger.

use botledger_core::db::SECS_PER_DAY;

use super::db::{DatabaseError, LedgerDatabase};
use super::models::BotRecord;

/// Parameters for recording one observation.
///
/// `ip_address` must already be in canonical form.
pub struct ActivityParams<'a> {
    pub ip_address: &'a str,
    pub user_agent: Option<&'a str>,
    pub request_uri: Option<&'a str>,
    /// `Some(reason)` blocks the address; `None` leaves the flag as it is.
    pub block_reason: Option<&'a str>,
}

impl LedgerDatabase {
    // =========================================================================
    // Activity queries
    // =========================================================================

    /// Insert or bump the record for an address in one statement.
    ///
    /// Blocking is sticky: a non-bot observation never clears `is_blocked`.
    /// `last_seen` never moves backwards, and a missing user agent or URI
    /// keeps the previously observed value.
    pub async fn upsert_activity(
        &self,
        params: &ActivityParams<'_>,
        now: i64,
    ) -> Result<BotRecord, DatabaseError> {
        let record = sqlx::query_as::<_, BotRecord>(
            r"
            INSERT INTO bot_records
                (ip_address, hits, is_blocked, block_reason, user_agent, request_uri, first_seen, last_seen)
            VALUES (?, 1, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (ip_address) DO UPDATE SET
                hits         = hits + 1,
                is_blocked   = MAX(is_blocked, excluded.is_blocked),
                block_reason = CASE WHEN excluded.is_blocked = 1
                                    THEN excluded.block_reason
                                    ELSE block_reason END,
                user_agent   = COALESCE(excluded.user_agent, user_agent),
                request_uri  = COALESCE(excluded.request_uri, request_uri),
                last_seen    = MAX(last_seen, excluded.last_seen)
            RETURNING *
            ",
        )
        .bind(params.ip_address)
        .bind(params.block_reason.is_some())
        .bind(params.block_reason)
        .bind(params.user_agent)
        .bind(params.request_uri)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(record)
    }

    /// Clear the blocked flag. Returns `false` when no such address exists.
    ///
    /// Only `is_blocked` is written, so concurrent hit increments survive.
    pub async fn unblock(&self, ip_address: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE bot_records SET is_blocked = 0 WHERE ip_address = ?")
            .bind(ip_address)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete records last seen more than `retention_days` before `now`.
    pub async fn delete_stale(
        &self,
        retention_days: u32,
        now: i64,
    ) -> Result<u64, DatabaseError> {
        let cutoff = now - i64::from(retention_days) * SECS_PER_DAY;

        let result = sqlx::query("DELETE FROM bot_records WHERE last_seen < ?")
            .bind(cutoff)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    /// Get a record by canonical address.
    pub async fn get_record(&self, ip_address: &str) -> Result<BotRecord, DatabaseError> {
        sqlx::query_as::<_, BotRecord>("SELECT * FROM bot_records WHERE ip_address = ?")
            .bind(ip_address)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Record {ip_address}")))
    }
}
