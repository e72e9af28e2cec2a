//! One-time import of historical table shapes.
//!
//! Older deployments stored the same data under drifting column names
//! (`blocked_reason` instead of `block_reason`, `timestamp` instead of
//! `last_seen`, sometimes as a `YYYY-MM-DD HH:MM:SS` string). The import
//! reads whichever spelling exists, folds every row into `bot_records`, and
//! drops the old table so the branching happens exactly once.

use serde::Serialize;
use sqlx::Row;
use tracing::{info, warn};

use botledger_core::addr::canonical_ip;

use super::db::{DatabaseError, LedgerDatabase};

/// Outcome of [`LedgerDatabase::import_legacy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LegacyImport {
    pub imported: u64,
    /// Rows whose address did not parse.
    pub skipped: u64,
}

struct LegacyColumns {
    hits: bool,
    is_blocked: bool,
    reason: Option<&'static str>,
    user_agent: bool,
    request_uri: bool,
    seen: Option<&'static str>,
}

impl LegacyColumns {
    fn detect(names: &[String]) -> Self {
        let has = |c: &str| names.iter().any(|n| n.eq_ignore_ascii_case(c));
        let pick = |options: &[&'static str]| options.iter().copied().find(|&c| has(c));
        Self {
            hits: has("hits"),
            is_blocked: has("is_blocked"),
            reason: pick(&["block_reason", "blocked_reason"]),
            user_agent: has("user_agent"),
            request_uri: has("request_uri"),
            seen: pick(&["last_seen", "timestamp"]),
        }
    }

    fn select_sql(&self, table: &str) -> String {
        let opt = |present: bool, col: &str, fallback: &str| {
            if present { col.to_string() } else { fallback.to_string() }
        };
        let seen = self.seen.map_or_else(
            || "NULL".to_string(),
            |c| {
                format!(
                    "CASE WHEN typeof({c}) = 'integer' THEN {c} \
                     ELSE CAST(strftime('%s', {c}) AS INTEGER) END"
                )
            },
        );
        format!(
            "SELECT ip_address, {hits}, {blocked}, {reason}, {ua}, {uri}, {seen} FROM {table}",
            hits = opt(self.hits, "COALESCE(hits, 0)", "0"),
            blocked = opt(self.is_blocked, "COALESCE(is_blocked, 0)", "0"),
            reason = self.reason.unwrap_or("NULL"),
            ua = opt(self.user_agent, "user_agent", "NULL"),
            uri = opt(self.request_uri, "request_uri", "NULL"),
        )
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

impl LedgerDatabase {
    /// Fold a legacy table into `bot_records` and drop it.
    ///
    /// A missing table is not an error and imports nothing. Rows for an
    /// address that already exists are merged: hits add up, a block on
    /// either side wins, and the later `last_seen` is kept.
    pub async fn import_legacy(&self, table: &str, now: i64) -> Result<LegacyImport, DatabaseError> {
        if !is_identifier(table) || table == "bot_records" {
            return Err(DatabaseError::Query(format!("Invalid legacy table name {table:?}")));
        }

        let exists: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_optional(self.pool())
        .await?;
        if exists.is_none() {
            info!(table, "No legacy table to import");
            return Ok(LegacyImport::default());
        }

        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
            .bind(table)
            .fetch_all(self.pool())
            .await?;
        if !names.iter().any(|n| n.eq_ignore_ascii_case("ip_address")) {
            return Err(DatabaseError::Query(format!(
                "Legacy table {table} has no ip_address column"
            )));
        }
        let columns = LegacyColumns::detect(&names);

        let mut tx = self.pool().begin().await?;
        let rows = sqlx::query(&columns.select_sql(table))
            .fetch_all(&mut *tx)
            .await?;

        let mut outcome = LegacyImport::default();
        for row in rows {
            let raw_ip: Option<String> = row.try_get(0)?;
            let Some(ip) = raw_ip.as_deref().and_then(|raw| canonical_ip(raw).ok()) else {
                warn!(table, ip = ?raw_ip, "Skipping legacy row with invalid address");
                outcome.skipped += 1;
                continue;
            };
            let hits: i64 = row.try_get(1)?;
            let is_blocked: i64 = row.try_get(2)?;
            let reason: Option<String> = row.try_get(3)?;
            let user_agent: Option<String> = row.try_get(4)?;
            let request_uri: Option<String> = row.try_get(5)?;
            let seen: Option<i64> = row.try_get(6)?;
            let seen = seen.unwrap_or(now);

            sqlx::query(
                r"
                INSERT INTO bot_records
                    (ip_address, hits, is_blocked, block_reason, user_agent, request_uri, first_seen, last_seen)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (ip_address) DO UPDATE SET
                    hits         = hits + excluded.hits,
                    is_blocked   = MAX(is_blocked, excluded.is_blocked),
                    block_reason = COALESCE(block_reason, excluded.block_reason),
                    user_agent   = COALESCE(user_agent, excluded.user_agent),
                    request_uri  = COALESCE(request_uri, excluded.request_uri),
                    first_seen   = MIN(first_seen, excluded.first_seen),
                    last_seen    = MAX(last_seen, excluded.last_seen)
                ",
            )
            .bind(&ip)
            .bind(hits.max(0))
            .bind(is_blocked != 0)
            .bind(reason)
            .bind(user_agent)
            .bind(request_uri)
            .bind(seen)
            .bind(seen)
            .execute(&mut *tx)
            .await?;
            outcome.imported += 1;
        }

        sqlx::query(&format!("DROP TABLE {table}"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            table,
            imported = outcome.imported,
            skipped = outcome.skipped,
            "Legacy table imported"
        );
        Ok(outcome)
    }
}
