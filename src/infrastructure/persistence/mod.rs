pub mod confluence_repositories;
pub mod database;

pub use confluence_repositories::{
    InMemoryCandleRepository, InMemoryLearningJournalRepository, InMemoryStrategyRuleRepository,
    InMemoryTradeLogRepository, SqliteCandleRepository, SqliteLearningJournalRepository,
    SqliteStrategyRuleRepository, SqliteTradeLogRepository,
};
pub use database::Database;
