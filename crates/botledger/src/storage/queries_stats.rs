//! Dashboard read queries.

use botledger_core::db::{SECS_PER_DAY, start_of_utc_day};

use super::db::{DatabaseError, LedgerDatabase};
use super::models::{BotRecord, Stats, TopBlockedIp};

impl LedgerDatabase {
    /// Blocked-record aggregates as of `now`.
    ///
    /// "Today" is the UTC calendar day containing `now`. All four reads run
    /// in one transaction so the counts and the top list agree.
    pub async fn blocked_stats(&self, now: i64, top_limit: u32) -> Result<Stats, DatabaseError> {
        let day_start = start_of_utc_day(now);
        let week_start = now - 7 * SECS_PER_DAY;

        let mut tx = self.pool().begin().await?;

        let total_blocked: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bot_records WHERE is_blocked = 1")
                .fetch_one(&mut *tx)
                .await?;

        let today_blocked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bot_records WHERE is_blocked = 1 AND last_seen >= ? AND last_seen < ?",
        )
        .bind(day_start)
        .bind(day_start + SECS_PER_DAY)
        .fetch_one(&mut *tx)
        .await?;

        let week_blocked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bot_records WHERE is_blocked = 1 AND last_seen >= ?",
        )
        .bind(week_start)
        .fetch_one(&mut *tx)
        .await?;

        let top_blocked_ips = sqlx::query_as::<_, TopBlockedIp>(
            r"
            SELECT ip_address, SUM(hits) AS hits
            FROM bot_records
            WHERE is_blocked = 1
            GROUP BY ip_address
            ORDER BY SUM(hits) DESC, ip_address ASC
            LIMIT ?
            ",
        )
        .bind(top_limit)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Stats {
            total_blocked,
            today_blocked,
            week_blocked,
            top_blocked_ips,
        })
    }

    /// Blocked records, most recently seen first.
    pub async fn list_blocked(&self, limit: u32) -> Result<Vec<BotRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, BotRecord>(
            "SELECT * FROM bot_records WHERE is_blocked = 1 ORDER BY last_seen DESC, ip_address ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(records)
    }

    /// Any record seen at or after `since`, most recent first.
    pub async fn list_recent(
        &self,
        since: i64,
        limit: u32,
    ) -> Result<Vec<BotRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, BotRecord>(
            "SELECT * FROM bot_records WHERE last_seen >= ? ORDER BY last_seen DESC, ip_address ASC LIMIT ?",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(records)
    }
}
