//! BotLedger operator CLI
//!
//! Composition root: resolves config, opens the database, builds the block
//! cache and ledger once, and runs a single operator command against them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use botledger::cache::MemoryBlockCache;
use botledger::storage::LedgerDatabase;
use botledger::{Ledger, LedgerError, LedgerSettings, Observation};
use botledger_core::config::load_config;
use botledger_core::tracing_init::{default_filter, init_tracing};

/// Bounds for the retention sweep period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Parser, Debug)]
#[command(name = "botledger")]
#[command(version, about = "Per-IP bot hit ledger - stats, unblocking, retention")]
struct Args {
    /// Settings file (JSON). Overrides the global settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to SQLite database file.
    #[arg(long, global = true, env = "BOTLEDGER_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    /// OTLP endpoint for ledger metrics.
    #[cfg(feature = "metrics")]
    #[arg(long, global = true, env = "BOTLEDGER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dashboard statistics.
    Stats,
    /// Clear the block on an address.
    Unblock { ip: String },
    /// Record one observation for an address.
    Record {
        ip: String,
        #[arg(long)]
        user_agent: Option<String>,
        #[arg(long)]
        uri: Option<String>,
        /// Classify the observation as bot activity (blocks the address).
        #[arg(long)]
        bot: bool,
        #[arg(long, requires = "bot")]
        reason: Option<String>,
    },
    /// Currently blocked addresses.
    Blocked {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Addresses seen recently, blocked or not.
    Activity {
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Delete records older than the retention window once.
    Cleanup {
        #[arg(long)]
        retention_days: Option<u32>,
    },
    /// Run cleanup periodically until interrupted.
    Sweep {
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Fold a legacy table into the ledger and drop it.
    ImportLegacy { table: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(path) = args.db_path {
        config.database_path = Some(path);
    }

    init_tracing(&default_filter(&config.log_level), args.log_json)?;

    #[cfg(feature = "metrics")]
    let metrics_guard = match &args.otlp_endpoint {
        Some(endpoint) => Some(botledger_core::metrics::init_metrics(endpoint)?),
        None => None,
    };

    let db_path = config
        .resolved_database_path()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine database path"))?;
    info!(path = %db_path.display(), "Opening ledger database");
    let db = LedgerDatabase::open(&db_path).await?;

    let ledger = Ledger::new(
        db,
        Arc::new(MemoryBlockCache::new()),
        LedgerSettings::from(&config),
    );

    match args.command {
        Command::Stats => print_json(&ledger.stats().await)?,
        Command::Unblock { ip } => match ledger.unblock(&ip).await {
            Ok(()) => print_json(&serde_json::json!({ "unblocked": ip }))?,
            Err(LedgerError::NotFound(ip)) => {
                anyhow::bail!("{ip} is not in the ledger");
            }
            Err(e) => return Err(e.into()),
        },
        Command::Record {
            ip,
            user_agent,
            uri,
            bot,
            reason,
        } => {
            let record = ledger
                .record_activity(&Observation {
                    ip_address: &ip,
                    user_agent: user_agent.as_deref(),
                    request_uri: uri.as_deref(),
                    classified_as_bot: bot,
                    reason: reason.as_deref(),
                })
                .await?;
            print_json(&record)?;
        }
        Command::Blocked { limit } => print_json(&ledger.list_blocked(limit).await?)?,
        Command::Activity { days, limit } => {
            print_json(&ledger.recent_activity(days, limit).await?)?;
        }
        Command::Cleanup { retention_days } => {
            let days = retention_days.unwrap_or(config.retention_days);
            let removed = ledger.cleanup(days).await?;
            print_json(&serde_json::json!({ "removed": removed, "retention_days": days }))?;
        }
        Command::Sweep { interval_secs } => {
            let interval = interval_secs.unwrap_or(config.cleanup_interval_secs);
            sweep(&ledger, config.retention_days, sweep_period(interval)).await;
        }
        Command::ImportLegacy { table } => print_json(&ledger.import_legacy(&table).await?)?,
    }

    #[cfg(feature = "metrics")]
    if let Some(guard) = metrics_guard {
        guard.shutdown()?;
    }

    Ok(())
}

/// Periodic retention cleanup. Failures are logged and retried on the next
/// tick.
async fn sweep(ledger: &Ledger, retention_days: u32, every: Duration) {
    info!(
        retention_days,
        interval_secs = every.as_secs(),
        "Starting retention sweep"
    );
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = ledger.cleanup(retention_days).await {
                    warn!(error = %e, "Retention sweep failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }
}

fn sweep_period(secs: u64) -> Duration {
    Duration::from_secs(secs).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

#[allow(clippy::print_stdout)]
fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
