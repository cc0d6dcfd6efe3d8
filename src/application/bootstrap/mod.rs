//! Wires the dependency graph once at process startup: repositories, the
//! rate-limited exchange client, the risk manager and order manager, the
//! signal pipeline and the backtest engine.
//!
//! Grounded on the teacher's `application/bootstrap/*` (construct-once,
//! hand out `Arc`s), re-pointed at this crate's own services — the
//! teacher's agent/news/sentiment wiring has no counterpart here.

use crate::application::risk_management::order_manager::OrderManager;
use crate::application::risk_management::risk_manager::RiskManager;
use crate::application::trading::signal_pipeline::SignalPipeline;
use crate::application::market_data::rate_limiter::RateLimiter;
use crate::config::Config;
use crate::domain::repositories::{
    CandleRepository, LearningJournalRepository, StrategyRuleRepository, TradeLogRepository,
};
use crate::infrastructure::exchange::hyperliquid::HyperliquidClient;
use crate::infrastructure::exchange::ExchangeClient;
use crate::infrastructure::persistence::confluence_repositories::{
    SqliteCandleRepository, SqliteLearningJournalRepository, SqliteStrategyRuleRepository,
    SqliteTradeLogRepository,
};
use crate::infrastructure::persistence::Database;
use anyhow::Result;
use std::sync::Arc;

const HYPERLIQUID_BASE_URL: &str = "https://api.hyperliquid.xyz";

/// Every long-lived collaborator a binary needs, constructed once and
/// handed out as `Arc`s.
pub struct AppContext {
    pub database: Database,
    pub candles: Arc<dyn CandleRepository>,
    pub strategy_rules: Arc<dyn StrategyRuleRepository>,
    pub trade_log: Arc<dyn TradeLogRepository>,
    pub learning_journal: Arc<dyn LearningJournalRepository>,
    pub exchange: Arc<dyn ExchangeClient>,
    pub risk_manager: RiskManager,
    pub order_manager: OrderManager,
    pub signal_pipeline: SignalPipeline,
}

impl AppContext {
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        let database = Database::new(&config.database_url).await?;

        let candles: Arc<dyn CandleRepository> =
            Arc::new(SqliteCandleRepository::new(database.pool.clone()));
        let strategy_rules: Arc<dyn StrategyRuleRepository> =
            Arc::new(SqliteStrategyRuleRepository::new(database.pool.clone()));
        let trade_log: Arc<dyn TradeLogRepository> =
            Arc::new(SqliteTradeLogRepository::new(database.pool.clone()));
        let learning_journal: Arc<dyn LearningJournalRepository> =
            Arc::new(SqliteLearningJournalRepository::new(database.pool.clone()));

        let rate_limiter = Arc::new(RateLimiter::new(
            config.ratelim.max_requests as usize,
            config.ratelim.window(),
            config.ratelim.headroom_percent,
        ));
        let exchange: Arc<dyn ExchangeClient> =
            Arc::new(HyperliquidClient::new(HYPERLIQUID_BASE_URL, rate_limiter));

        let risk_manager = RiskManager::new(config.risk.clone());
        let order_manager = OrderManager::new();
        let signal_pipeline = SignalPipeline::new(
            config.signal.clone(),
            config.confluence.clone(),
            config.detector.clone(),
        );

        Ok(Self {
            database,
            candles,
            strategy_rules,
            trade_log,
            learning_journal,
            exchange,
            risk_manager,
            order_manager,
            signal_pipeline,
        })
    }
}
