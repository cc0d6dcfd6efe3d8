//! Repository trait abstractions for data persistence, keeping business
//! logic decoupled from storage. Each trait covers one aggregate; both an
//! `InMemory` (test double) and a `sqlx`-backed SQLite implementation live
//! in `infrastructure::persistence::confluence_repositories`.

use anyhow::Result;
use async_trait::async_trait;

/// Persists OHLCV candles keyed by symbol/timeframe/source, append-only
/// with upsert-on-timestamp-collision semantics (a re-fetched bar replaces
/// the stored one rather than duplicating it).
#[async_trait]
pub trait CandleRepository: Send + Sync {
    async fn upsert_many(&self, candles: &[crate::domain::market::candle::Candle]) -> Result<()>;

    async fn find_range(
        &self,
        symbol: &str,
        timeframe: crate::domain::market::timeframe::Timeframe,
        source: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Vec<crate::domain::market::candle::Candle>>;
}

/// Persists strategy rules (the condition trees consulted by the signal
/// pipeline) so they can be edited and reloaded without a redeploy.
#[async_trait]
pub trait StrategyRuleRepository: Send + Sync {
    async fn save(&self, rule: &crate::domain::trading::strategy_rule::StrategyRule) -> Result<()>;

    async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<crate::domain::trading::strategy_rule::StrategyRule>>;

    async fn find_enabled(&self) -> Result<Vec<crate::domain::trading::strategy_rule::StrategyRule>>;
}

/// Persists closed trades produced by the backtest engine or live order
/// manager, for later outcome analysis.
#[async_trait]
pub trait TradeLogRepository: Send + Sync {
    async fn append(&self, trade: &crate::domain::trading::trade::Trade) -> Result<()>;

    async fn find_by_strategy(
        &self,
        strategy_name: &str,
    ) -> Result<Vec<crate::domain::trading::trade::Trade>>;

    async fn find_all(&self) -> Result<Vec<crate::domain::trading::trade::Trade>>;
}

/// Persists the learning insights produced by the outcome feedback loop, so
/// confidence adjustments survive a restart.
#[async_trait]
pub trait LearningJournalRepository: Send + Sync {
    async fn append(&self, insight: &crate::domain::learning::LearningInsight) -> Result<()>;

    async fn find_recent(&self, limit: usize) -> Result<Vec<crate::domain::learning::LearningInsight>>;
}
