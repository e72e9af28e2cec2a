//! Storage layer tests for the ledger.

use botledger_core::db::{SECS_PER_DAY, start_of_utc_day, unix_timestamp};

use super::db::{DatabaseError, LedgerDatabase};
use super::queries::ActivityParams;

async fn test_db() -> LedgerDatabase {
    LedgerDatabase::open_in_memory().await.unwrap()
}

fn observe(ip: &str) -> ActivityParams<'_> {
    ActivityParams {
        ip_address: ip,
        user_agent: Some("curl/8.0"),
        request_uri: Some("/"),
        block_reason: None,
    }
}

fn block<'a>(ip: &'a str, reason: &'a str) -> ActivityParams<'a> {
    ActivityParams {
        block_reason: Some(reason),
        ..observe(ip)
    }
}

// === Activity upsert tests ===

#[tokio::test]
async fn first_observation_creates_record() {
    let db = test_db().await;
    let now = unix_timestamp();

    let rec = db.upsert_activity(&observe("10.0.0.1"), now).await.unwrap();

    assert_eq!(rec.hits, 1);
    assert!(!rec.is_blocked);
    assert_eq!(rec.block_reason, None);
    assert_eq!(rec.first_seen, now);
    assert_eq!(rec.last_seen, now);
}

#[tokio::test]
async fn blocking_is_sticky_across_clean_observations() {
    let db = test_db().await;
    let now = unix_timestamp();

    db.upsert_activity(&block("10.0.0.5", "rate-limit"), now)
        .await
        .unwrap();
    let rec = db.upsert_activity(&observe("10.0.0.5"), now + 1).await.unwrap();

    assert_eq!(rec.hits, 2);
    assert!(rec.is_blocked);
    assert_eq!(rec.block_reason.as_deref(), Some("rate-limit"));
    assert_eq!(rec.last_seen, now + 1);
}

#[tokio::test]
async fn reblocking_replaces_reason() {
    let db = test_db().await;
    let now = unix_timestamp();

    db.upsert_activity(&block("10.0.0.5", "rate-limit"), now)
        .await
        .unwrap();
    let rec = db
        .upsert_activity(&block("10.0.0.5", "honeypot"), now)
        .await
        .unwrap();

    assert_eq!(rec.block_reason.as_deref(), Some("honeypot"));
}

#[tokio::test]
async fn last_seen_never_moves_backwards() {
    let db = test_db().await;
    let now = unix_timestamp();

    db.upsert_activity(&observe("10.0.0.1"), now).await.unwrap();
    let rec = db
        .upsert_activity(&observe("10.0.0.1"), now - 100)
        .await
        .unwrap();

    assert_eq!(rec.last_seen, now);
    assert!(rec.last_seen >= rec.first_seen);
}

#[tokio::test]
async fn missing_user_agent_keeps_previous() {
    let db = test_db().await;
    let now = unix_timestamp();

    db.upsert_activity(&observe("10.0.0.1"), now).await.unwrap();
    let rec = db
        .upsert_activity(
            &ActivityParams {
                ip_address: "10.0.0.1",
                user_agent: None,
                request_uri: Some("/wp-login.php"),
                block_reason: None,
            },
            now,
        )
        .await
        .unwrap();

    assert_eq!(rec.user_agent.as_deref(), Some("curl/8.0"));
    assert_eq!(rec.request_uri.as_deref(), Some("/wp-login.php"));
}

#[tokio::test]
async fn observations_are_isolated_per_address() {
    let db = test_db().await;
    let now = unix_timestamp();

    db.upsert_activity(&observe("10.0.0.2"), now).await.unwrap();
    let before = db.get_record("10.0.0.2").await.unwrap();

    db.upsert_activity(&block("10.0.0.1", "scanner"), now + 5)
        .await
        .unwrap();
    db.upsert_activity(&observe("10.0.0.1"), now + 6).await.unwrap();

    assert_eq!(db.get_record("10.0.0.2").await.unwrap(), before);
}

#[tokio::test]
async fn concurrent_upserts_lose_no_hits() {
    let dir = tempfile::tempdir().unwrap();
    let db = LedgerDatabase::open(&dir.path().join("ledger.db"))
        .await
        .unwrap();
    let now = unix_timestamp();

    let mut handles = Vec::new();
    for i in 0..50 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let params = if i % 7 == 0 {
                block("192.0.2.7", "crawler")
            } else {
                observe("192.0.2.7")
            };
            db.upsert_activity(&params, now).await.map(|_| ())
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    assert_eq!(db.get_record("192.0.2.7").await.unwrap().hits, 50);
}

// === Unblock tests ===

#[tokio::test]
async fn unblock_clears_flag_and_keeps_hits() {
    let db = test_db().await;
    let now = unix_timestamp();
    db.upsert_activity(&block("10.0.0.5", "rate-limit"), now)
        .await
        .unwrap();
    db.upsert_activity(&observe("10.0.0.5"), now).await.unwrap();

    assert!(db.unblock("10.0.0.5").await.unwrap());

    let rec = db.get_record("10.0.0.5").await.unwrap();
    assert!(!rec.is_blocked);
    assert_eq!(rec.hits, 2);
    assert_eq!(rec.active_block_reason(), None);
}

#[tokio::test]
async fn unblock_twice_still_matches_existing_row() {
    let db = test_db().await;
    db.upsert_activity(&block("10.0.0.5", "x"), unix_timestamp())
        .await
        .unwrap();

    assert!(db.unblock("10.0.0.5").await.unwrap());
    assert!(db.unblock("10.0.0.5").await.unwrap());
    assert!(!db.get_record("10.0.0.5").await.unwrap().is_blocked);
}

#[tokio::test]
async fn unblock_unknown_address_reports_no_row() {
    let db = test_db().await;
    assert!(!db.unblock("10.9.9.9").await.unwrap());
}

#[tokio::test]
async fn get_missing_record_is_not_found() {
    let db = test_db().await;
    assert!(matches!(
        db.get_record("10.9.9.9").await,
        Err(DatabaseError::NotFound(_))
    ));
}

// === Cleanup tests ===

#[tokio::test]
async fn cleanup_honours_retention_boundary() {
    let db = test_db().await;
    let now = unix_timestamp();

    db.upsert_activity(&block("10.0.0.31", "old"), now - 31 * SECS_PER_DAY)
        .await
        .unwrap();
    db.upsert_activity(&observe("10.0.0.29"), now - 29 * SECS_PER_DAY)
        .await
        .unwrap();
    db.upsert_activity(&observe("10.0.0.0"), now).await.unwrap();

    let removed = db.delete_stale(30, now).await.unwrap();

    assert_eq!(removed, 1);
    assert!(db.get_record("10.0.0.31").await.is_err());
    assert!(db.get_record("10.0.0.29").await.is_ok());
    assert!(db.get_record("10.0.0.0").await.is_ok());
}

#[tokio::test]
async fn cleanup_on_empty_table_removes_nothing() {
    let db = test_db().await;
    assert_eq!(db.delete_stale(30, unix_timestamp()).await.unwrap(), 0);
}

// === Stats tests ===

#[tokio::test]
async fn stats_on_empty_store_are_zero() {
    let db = test_db().await;
    let stats = db.blocked_stats(unix_timestamp(), 10).await.unwrap();

    assert_eq!(stats.total_blocked, 0);
    assert_eq!(stats.today_blocked, 0);
    assert_eq!(stats.week_blocked, 0);
    assert!(stats.top_blocked_ips.is_empty());
}

#[tokio::test]
async fn stats_bucket_by_utc_day_and_week() {
    let db = test_db().await;
    // Noon UTC, so "an hour ago" is still today.
    let now = start_of_utc_day(unix_timestamp()) + SECS_PER_DAY / 2;

    db.upsert_activity(&block("10.0.0.1", "a"), now - 3600)
        .await
        .unwrap();
    db.upsert_activity(&block("10.0.0.2", "b"), now - 2 * SECS_PER_DAY)
        .await
        .unwrap();
    db.upsert_activity(&block("10.0.0.3", "c"), now - 10 * SECS_PER_DAY)
        .await
        .unwrap();
    db.upsert_activity(&observe("10.0.0.4"), now).await.unwrap();

    let stats = db.blocked_stats(now, 10).await.unwrap();

    assert_eq!(stats.total_blocked, 3);
    assert_eq!(stats.today_blocked, 1);
    assert_eq!(stats.week_blocked, 2);
    assert_eq!(stats.top_blocked_ips.len(), 3);
}

#[tokio::test]
async fn top_blocked_orders_by_hits_then_address() {
    let db = test_db().await;
    let now = unix_timestamp();

    for (ip, hits) in [("10.0.0.9", 2), ("10.0.0.1", 5), ("10.0.0.5", 2), ("10.0.0.7", 1)] {
        for _ in 0..hits {
            db.upsert_activity(&block(ip, "x"), now).await.unwrap();
        }
    }
    db.upsert_activity(&observe("10.0.0.200"), now).await.unwrap();

    let first = db.blocked_stats(now, 3).await.unwrap();
    let order: Vec<(&str, i64)> = first
        .top_blocked_ips
        .iter()
        .map(|t| (t.ip_address.as_str(), t.hits))
        .collect();
    assert_eq!(order, [("10.0.0.1", 5), ("10.0.0.5", 2), ("10.0.0.9", 2)]);

    for _ in 0..5 {
        let again = db.blocked_stats(now, 3).await.unwrap();
        assert_eq!(again.top_blocked_ips, first.top_blocked_ips);
    }
}

#[tokio::test]
async fn total_blocked_tracks_unblocks() {
    let db = test_db().await;
    let now = unix_timestamp();
    for i in 0..12 {
        db.upsert_activity(&block(&format!("10.1.0.{i}"), "x"), now)
            .await
            .unwrap();
    }
    db.unblock("10.1.0.3").await.unwrap();

    let stats = db.blocked_stats(now, 10).await.unwrap();
    assert_eq!(stats.total_blocked, 11);
    assert_eq!(stats.top_blocked_ips.len(), 10);
    assert!(stats.top_blocked_ips.iter().all(|t| t.ip_address != "10.1.0.3"));
}

#[tokio::test]
async fn lists_filter_and_order() {
    let db = test_db().await;
    let now = unix_timestamp();

    db.upsert_activity(&block("10.0.0.1", "a"), now - 100)
        .await
        .unwrap();
    db.upsert_activity(&block("10.0.0.2", "b"), now).await.unwrap();
    db.upsert_activity(&observe("10.0.0.3"), now - 50).await.unwrap();
    db.upsert_activity(&observe("10.0.0.4"), now - 40 * SECS_PER_DAY)
        .await
        .unwrap();

    let blocked = db.list_blocked(20).await.unwrap();
    let ips: Vec<&str> = blocked.iter().map(|r| r.ip_address.as_str()).collect();
    assert_eq!(ips, ["10.0.0.2", "10.0.0.1"]);

    let recent = db.list_recent(now - 30 * SECS_PER_DAY, 50).await.unwrap();
    let ips: Vec<&str> = recent.iter().map(|r| r.ip_address.as_str()).collect();
    assert_eq!(ips, ["10.0.0.2", "10.0.0.3", "10.0.0.1"]);

    assert_eq!(db.list_blocked(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn closed_pool_surfaces_errors() {
    let db = test_db().await;
    db.pool().close().await;

    assert!(db.blocked_stats(unix_timestamp(), 10).await.is_err());
    assert!(db.unblock("10.0.0.1").await.is_err());
    assert!(db.upsert_activity(&observe("10.0.0.1"), 0).await.is_err());
}

// === Legacy import tests ===

#[tokio::test]
async fn import_legacy_maps_drifted_columns() {
    let db = test_db().await;
    let now = unix_timestamp();

    sqlx::query(
        "CREATE TABLE wp_security_blocked_bots (
            id INTEGER PRIMARY KEY,
            ip_address TEXT,
            hits INTEGER,
            blocked_reason TEXT,
            user_agent TEXT,
            timestamp TEXT
        )",
    )
    .execute(db.pool())
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO wp_security_blocked_bots (ip_address, hits, blocked_reason, user_agent, timestamp) VALUES
            ('10.0.0.5', 4, 'rate-limit', 'bot/1.0', '2024-01-01 12:00:00'),
            ('::ffff:10.0.0.6', 2, NULL, NULL, NULL),
            ('not-an-ip', 9, NULL, NULL, NULL)",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let outcome = db
        .import_legacy("wp_security_blocked_bots", now)
        .await
        .unwrap();
    assert_eq!(outcome.imported, 2);
    assert_eq!(outcome.skipped, 1);

    let rec = db.get_record("10.0.0.5").await.unwrap();
    assert_eq!(rec.hits, 4);
    assert_eq!(rec.block_reason.as_deref(), Some("rate-limit"));
    assert!(!rec.is_blocked);
    // 2024-01-01T12:00:00Z
    assert_eq!(rec.last_seen, 1_704_110_400);

    let mapped = db.get_record("10.0.0.6").await.unwrap();
    assert_eq!(mapped.last_seen, now);

    // Table is gone; a second run is a no-op.
    let again = db
        .import_legacy("wp_security_blocked_bots", now)
        .await
        .unwrap();
    assert_eq!(again.imported, 0);
}

#[tokio::test]
async fn import_legacy_merges_into_existing_rows() {
    let db = test_db().await;
    let now = unix_timestamp();
    db.upsert_activity(&observe("10.0.0.5"), now).await.unwrap();

    sqlx::query(
        "CREATE TABLE old_bots (ip_address TEXT, hits INTEGER, is_blocked INTEGER, block_reason TEXT, last_seen INTEGER)",
    )
    .execute(db.pool())
    .await
    .unwrap();
    sqlx::query("INSERT INTO old_bots VALUES ('10.0.0.5', 3, 1, 'scanner', ?)")
        .bind(now - 1000)
        .execute(db.pool())
        .await
        .unwrap();

    db.import_legacy("old_bots", now).await.unwrap();

    let rec = db.get_record("10.0.0.5").await.unwrap();
    assert_eq!(rec.hits, 4);
    assert!(rec.is_blocked);
    assert_eq!(rec.block_reason.as_deref(), Some("scanner"));
    assert_eq!(rec.first_seen, now - 1000);
    assert_eq!(rec.last_seen, now);
}

#[tokio::test]
async fn import_legacy_rejects_bad_table_names() {
    let db = test_db().await;
    assert!(db.import_legacy("x; DROP TABLE bot_records", 0).await.is_err());
    assert!(db.import_legacy("bot_records", 0).await.is_err());
}
