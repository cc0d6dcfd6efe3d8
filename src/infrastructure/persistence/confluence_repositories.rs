//! In-memory and SQLite implementations of the confluence-engine
//! repository traits, grounded on `persistence/repositories.rs`'s
//! string-encoded-decimal / JSON-blob storage conventions.

use crate::domain::learning::LearningInsight;
use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::{CandleRepository, LearningJournalRepository, StrategyRuleRepository, TradeLogRepository};
use crate::domain::trading::strategy_rule::StrategyRule;
use crate::domain::trading::trade::Trade;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

// ---------------------------------------------------------------- in-memory

#[derive(Default)]
pub struct InMemoryCandleRepository {
    candles: RwLock<HashMap<(String, Timeframe, String), Vec<Candle>>>,
}

impl InMemoryCandleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CandleRepository for InMemoryCandleRepository {
    async fn upsert_many(&self, candles: &[Candle]) -> Result<()> {
        let mut store = self.candles.write().unwrap();
        for candle in candles {
            let key = (candle.symbol.clone(), candle.timeframe, candle.source.clone());
            let bucket = store.entry(key).or_default();
            if let Some(existing) = bucket.iter_mut().find(|c| c.timestamp == candle.timestamp) {
                *existing = candle.clone();
            } else {
                bucket.push(candle.clone());
            }
        }
        for bucket in store.values_mut() {
            bucket.sort_by_key(|c| c.timestamp);
        }
        Ok(())
    }

    async fn find_range(&self, symbol: &str, timeframe: Timeframe, source: &str, start_ts: i64, end_ts: i64) -> Result<Vec<Candle>> {
        let store = self.candles.read().unwrap();
        let key = (symbol.to_string(), timeframe, source.to_string());
        Ok(store
            .get(&key)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|c| c.timestamp >= start_ts && c.timestamp <= end_ts)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryStrategyRuleRepository {
    rules: RwLock<HashMap<String, StrategyRule>>,
}

impl InMemoryStrategyRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StrategyRuleRepository for InMemoryStrategyRuleRepository {
    async fn save(&self, rule: &StrategyRule) -> Result<()> {
        self.rules.write().unwrap().insert(rule.name.clone(), rule.clone());
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<StrategyRule>> {
        Ok(self.rules.read().unwrap().get(name).cloned())
    }

    async fn find_enabled(&self) -> Result<Vec<StrategyRule>> {
        Ok(self.rules.read().unwrap().values().filter(|r| r.enabled).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryTradeLogRepository {
    trades: RwLock<Vec<Trade>>,
}

impl InMemoryTradeLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeLogRepository for InMemoryTradeLogRepository {
    async fn append(&self, trade: &Trade) -> Result<()> {
        self.trades.write().unwrap().push(trade.clone());
        Ok(())
    }

    async fn find_by_strategy(&self, strategy_name: &str) -> Result<Vec<Trade>> {
        Ok(self
            .trades
            .read()
            .unwrap()
            .iter()
            .filter(|t| t.strategy_name == strategy_name)
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Trade>> {
        Ok(self.trades.read().unwrap().clone())
    }
}

#[derive(Default)]
pub struct InMemoryLearningJournalRepository {
    insights: RwLock<Vec<LearningInsight>>,
}

impl InMemoryLearningJournalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LearningJournalRepository for InMemoryLearningJournalRepository {
    async fn append(&self, insight: &LearningInsight) -> Result<()> {
        self.insights.write().unwrap().push(insight.clone());
        Ok(())
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<LearningInsight>> {
        let insights = self.insights.read().unwrap();
        let start = insights.len().saturating_sub(limit);
        Ok(insights[start..].to_vec())
    }
}

// --------------------------------------------------------------------- sqlx

pub struct SqliteCandleRepository {
    pool: SqlitePool,
}

impl SqliteCandleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandleRepository for SqliteCandleRepository {
    async fn upsert_many(&self, candles: &[Candle]) -> Result<()> {
        for candle in candles {
            sqlx::query(
                r#"
                INSERT INTO engine_candles (symbol, timeframe, source, timestamp, open, high, low, close, volume)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, timeframe, source, timestamp) DO UPDATE SET
                    open = excluded.open, high = excluded.high, low = excluded.low,
                    close = excluded.close, volume = excluded.volume
                "#,
            )
            .bind(&candle.symbol)
            .bind(candle.timeframe.to_string())
            .bind(&candle.source)
            .bind(candle.timestamp)
            .bind(candle.open.to_string())
            .bind(candle.high.to_string())
            .bind(candle.low.to_string())
            .bind(candle.close.to_string())
            .bind(candle.volume.to_string())
            .execute(&self.pool)
            .await
            .context("failed to upsert candle")?;
        }
        Ok(())
    }

    async fn find_range(&self, symbol: &str, timeframe: Timeframe, source: &str, start_ts: i64, end_ts: i64) -> Result<Vec<Candle>> {
        let rows = sqlx::query(
            "SELECT * FROM engine_candles WHERE symbol = ? AND timeframe = ? AND source = ? \
             AND timestamp >= ? AND timestamp <= ? ORDER BY timestamp ASC",
        )
        .bind(symbol)
        .bind(timeframe.to_string())
        .bind(source)
        .bind(start_ts)
        .bind(end_ts)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let timeframe_str: String = row.try_get("timeframe")?;
            let candle = Candle::new(
                row.try_get::<String, _>("symbol")?,
                Timeframe::from_str(&timeframe_str).unwrap_or(Timeframe::OneMin),
                row.try_get("timestamp")?,
                decimal(&row, "open")?,
                decimal(&row, "high")?,
                decimal(&row, "low")?,
                decimal(&row, "close")?,
                decimal(&row, "volume")?,
                row.try_get::<String, _>("source")?,
            )
            .context("persisted candle failed validation")?;
            out.push(candle);
        }
        Ok(out)
    }
}

fn decimal(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Decimal> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).with_context(|| format!("bad decimal in column {column}"))
}

pub struct SqliteStrategyRuleRepository {
    pool: SqlitePool,
}

impl SqliteStrategyRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StrategyRuleRepository for SqliteStrategyRuleRepository {
    async fn save(&self, rule: &StrategyRule) -> Result<()> {
        let rule_json = serde_json::to_string(rule).context("failed to serialize strategy rule")?;
        sqlx::query(
            r#"
            INSERT INTO strategy_rules (name, version, enabled, rule_json, updated_at)
            VALUES (?, ?, ?, ?, strftime('%s', 'now'))
            ON CONFLICT(name) DO UPDATE SET
                version = excluded.version, enabled = excluded.enabled,
                rule_json = excluded.rule_json, updated_at = excluded.updated_at
            "#,
        )
        .bind(&rule.name)
        .bind(rule.version as i64)
        .bind(rule.enabled)
        .bind(rule_json)
        .execute(&self.pool)
        .await
        .context("failed to save strategy rule")?;
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<StrategyRule>> {
        let row = sqlx::query("SELECT rule_json FROM strategy_rules WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let rule_json: String = row.try_get("rule_json")?;
                Ok(Some(serde_json::from_str(&rule_json)?))
            }
            None => Ok(None),
        }
    }

    async fn find_enabled(&self) -> Result<Vec<StrategyRule>> {
        let rows = sqlx::query("SELECT rule_json FROM strategy_rules WHERE enabled = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let rule_json: String = row.try_get("rule_json")?;
                serde_json::from_str(&rule_json).map_err(anyhow::Error::from)
            })
            .collect()
    }
}

pub struct SqliteTradeLogRepository {
    pool: SqlitePool,
}

impl SqliteTradeLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeLogRepository for SqliteTradeLogRepository {
    async fn append(&self, trade: &Trade) -> Result<()> {
        let trade_json = serde_json::to_string(trade).context("failed to serialize trade")?;
        sqlx::query(
            "INSERT INTO trade_log (id, strategy_name, trade_json, entry_timestamp) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&trade.id)
        .bind(&trade.strategy_name)
        .bind(trade_json)
        .bind(trade.entry_timestamp)
        .execute(&self.pool)
        .await
        .context("failed to append trade")?;
        Ok(())
    }

    async fn find_by_strategy(&self, strategy_name: &str) -> Result<Vec<Trade>> {
        let rows = sqlx::query("SELECT trade_json FROM trade_log WHERE strategy_name = ? ORDER BY entry_timestamp ASC")
            .bind(strategy_name)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let trade_json: String = row.try_get("trade_json")?;
                serde_json::from_str(&trade_json).map_err(anyhow::Error::from)
            })
            .collect()
    }

    async fn find_all(&self) -> Result<Vec<Trade>> {
        let rows = sqlx::query("SELECT trade_json FROM trade_log ORDER BY entry_timestamp ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let trade_json: String = row.try_get("trade_json")?;
                serde_json::from_str(&trade_json).map_err(anyhow::Error::from)
            })
            .collect()
    }
}

pub struct SqliteLearningJournalRepository {
    pool: SqlitePool,
}

impl SqliteLearningJournalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LearningJournalRepository for SqliteLearningJournalRepository {
    async fn append(&self, insight: &LearningInsight) -> Result<()> {
        let insight_json = serde_json::to_string(insight).context("failed to serialize learning insight")?;
        sqlx::query("INSERT INTO learning_journal (insight_json) VALUES (?)")
            .bind(insight_json)
            .execute(&self.pool)
            .await
            .context("failed to append learning insight")?;
        Ok(())
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<LearningInsight>> {
        let rows = sqlx::query("SELECT insight_json FROM learning_journal ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let insight_json: String = row.try_get("insight_json")?;
                serde_json::from_str(&insight_json).map_err(anyhow::Error::from)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(symbol: &str, source: &str, ts: i64) -> Candle {
        Candle::new(symbol, Timeframe::OneMin, ts, dec!(100), dec!(101), dec!(99), dec!(100), dec!(10), source).unwrap()
    }

    #[tokio::test]
    async fn upsert_replaces_same_timestamp_candle() {
        let repo = InMemoryCandleRepository::new();
        repo.upsert_many(&[candle("BTC-USD", "hyperliquid", 0)]).await.unwrap();
        let mut updated = candle("BTC-USD", "hyperliquid", 0);
        updated.close = dec!(105);
        repo.upsert_many(&[updated]).await.unwrap();

        let found = repo.find_range("BTC-USD", Timeframe::OneMin, "hyperliquid", 0, 0).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].close, dec!(105));
    }

    #[tokio::test]
    async fn different_sources_do_not_clobber_each_other() {
        let repo = InMemoryCandleRepository::new();
        repo.upsert_many(&[candle("BTC-USD", "hyperliquid", 0), candle("BTC-USD", "csv", 0)])
            .await
            .unwrap();
        let hl = repo.find_range("BTC-USD", Timeframe::OneMin, "hyperliquid", 0, 0).await.unwrap();
        let csv = repo.find_range("BTC-USD", Timeframe::OneMin, "csv", 0, 0).await.unwrap();
        assert_eq!(hl.len(), 1);
        assert_eq!(csv.len(), 1);
    }

    #[tokio::test]
    async fn learning_journal_find_recent_respects_limit() {
        let repo = InMemoryLearningJournalRepository::new();
        for i in 0..5 {
            repo.append(&LearningInsight {
                rule_name: format!("rule-{i}"),
                quality: crate::domain::market::confluence::ConfluenceQuality::Medium,
                stats: crate::domain::learning::BucketStats {
                    total: 10,
                    wins: 5,
                    edge: 0.1,
                    sample_sufficient: true,
                },
                recommended_confidence_delta: 0.0,
                reason: "test".to_string(),
            })
            .await
            .unwrap();
        }
        let recent = repo.find_recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].rule_name, "rule-4");
    }
}
