pub mod engine;
pub mod metrics;

pub use engine::{BacktestConfig, BacktestEngine, BacktestResult};
pub use metrics::{compute_metrics, BacktestMetrics};
