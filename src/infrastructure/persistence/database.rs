use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Singleton database wrapper
#[allow(dead_code)]
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal); // Better for concurrency

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // 1. Confluence-engine candles, keyed by symbol/timeframe/source so a
        // re-fetch from a different source can't clobber another source's bar.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS engine_candles (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                source TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume TEXT NOT NULL,
                PRIMARY KEY (symbol, timeframe, source, timestamp)
            );
            CREATE INDEX IF NOT EXISTS idx_engine_candles_range
            ON engine_candles (symbol, timeframe, source, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create engine_candles table")?;

        // 2. Strategy rules: condition trees consulted by the signal pipeline.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS strategy_rules (
                name TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT 1,
                rule_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create strategy_rules table")?;

        // 3. Trade log: closed trades from backtests or live trading.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_log (
                id TEXT PRIMARY KEY,
                strategy_name TEXT NOT NULL,
                trade_json TEXT NOT NULL,
                entry_timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trade_log_strategy
            ON trade_log (strategy_name, entry_timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trade_log table")?;

        // 4. Learning journal: outcome-analysis confidence adjustments.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS learning_journal (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                insight_json TEXT NOT NULL,
                created_at INTEGER DEFAULT (strftime('%s', 'now'))
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create learning_journal table")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
