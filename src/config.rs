//! Runtime configuration, loaded from environment variables with sensible
//! defaults — grounded on the teacher's flat `Config::from_env()` idiom,
//! re-grouped into the option table (risk / ratelim / backtest / signal /
//! confluence / detector) this crate actually recognizes.

use crate::domain::risk::risk_config::RiskConfig;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    pub headroom_percent: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
            headroom_percent: 0.3,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone)]
pub struct BacktestSettings {
    pub initial_capital: Decimal,
    pub position_size_percent: f64,
    pub max_open_trades: usize,
    pub commission_percent: f64,
    pub slippage_percent: f64,
    pub partial_exit_enabled: bool,
    pub tp1_exit_percent: f64,
    pub tp2_exit_percent: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::from(10_000),
            position_size_percent: 0.01,
            max_open_trades: 1,
            commission_percent: 0.0004,
            slippage_percent: 0.0005,
            partial_exit_enabled: true,
            tp1_exit_percent: 0.5,
            tp2_exit_percent: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub min_confluence_score: f64,
    pub min_pattern_score: f64,
    pub min_agreement_percentage: f64,
    pub min_risk_reward: f64,
    pub max_stop_loss_percent: f64,
    pub use_atr_stops: bool,
    pub atr_multiplier: f64,
    pub require_higher_tf_alignment: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_confluence_score: 0.6,
            min_pattern_score: 0.5,
            min_agreement_percentage: 0.6,
            min_risk_reward: 1.5,
            max_stop_loss_percent: 0.03,
            use_atr_stops: true,
            atr_multiplier: 2.0,
            require_higher_tf_alignment: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfluenceWeightsConfig {
    pub pattern: f64,
    pub structure: f64,
    pub cycle: f64,
    pub timeframe: f64,
    pub zone: f64,
}

impl Default for ConfluenceWeightsConfig {
    fn default() -> Self {
        Self {
            pattern: 0.30,
            structure: 0.25,
            cycle: 0.15,
            timeframe: 0.20,
            zone: 0.10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub lookback: usize,
    pub min_swing_body_pct: f64,
    pub min_gap_size: f64,
    pub min_volume_percentile: f64,
    pub min_move_size: f64,
    pub zone_merge_threshold: f64,
    pub min_touches: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            lookback: 50,
            min_swing_body_pct: 0.1,
            min_gap_size: 0.0005,
            min_volume_percentile: 0.7,
            min_move_size: 0.005,
            zone_merge_threshold: 0.002,
            min_touches: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub symbols: Vec<String>,
    pub risk: RiskConfig,
    pub ratelim: RateLimitConfig,
    pub backtest: BacktestSettings,
    pub signal: SignalConfig,
    pub confluence: ConfluenceWeightsConfig,
    pub detector: DetectorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://confluence-engine.db".to_string(),
            symbols: vec!["BTC-USD".to_string()],
            risk: RiskConfig::default(),
            ratelim: RateLimitConfig::default(),
            backtest: BacktestSettings::default(),
            signal: SignalConfig::default(),
            confluence: ConfluenceWeightsConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

macro_rules! env_parsed {
    ($key:expr, $default:expr) => {
        match env::var($key) {
            Ok(v) => v.parse().with_context(|| format!("failed to parse {}", $key))?,
            Err(_) => $default,
        }
    };
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let symbols_str = env::var("SYMBOLS").unwrap_or_else(|_| "BTC-USD".to_string());
        let symbols: Vec<String> = symbols_str.split(',').map(|s| s.trim().to_string()).collect();

        let risk = RiskConfig {
            max_order_notional: env_parsed!("RISK_MAX_ORDER_NOTIONAL", defaults.risk.max_order_notional),
            max_position_size_usd: env_parsed!("RISK_MAX_POSITION_SIZE_USD", defaults.risk.max_position_size_usd),
            max_position_size_percent: env_parsed!("RISK_MAX_POSITION_SIZE_PERCENT", defaults.risk.max_position_size_percent),
            max_total_exposure: env_parsed!("RISK_MAX_TOTAL_EXPOSURE", defaults.risk.max_total_exposure),
            max_exposure_percent: env_parsed!("RISK_MAX_EXPOSURE_PERCENT", defaults.risk.max_exposure_percent),
            max_positions: env_parsed!("RISK_MAX_POSITIONS", defaults.risk.max_positions),
            max_open_orders: env_parsed!("RISK_MAX_OPEN_ORDERS", defaults.risk.max_open_orders),
            max_daily_loss: env_parsed!("RISK_MAX_DAILY_LOSS", defaults.risk.max_daily_loss),
            max_daily_loss_percent: env_parsed!("RISK_MAX_DAILY_LOSS_PERCENT", defaults.risk.max_daily_loss_percent),
            max_consecutive_losses: env_parsed!("RISK_MAX_CONSECUTIVE_LOSSES", defaults.risk.max_consecutive_losses),
            max_consecutive_errors: env_parsed!("RISK_MAX_CONSECUTIVE_ERRORS", defaults.risk.max_consecutive_errors),
            max_price_deviation_percent: env_parsed!("RISK_MAX_PRICE_DEVIATION_PERCENT", defaults.risk.max_price_deviation_percent),
            circuit_breaker_cooldown_seconds: env_parsed!(
                "RISK_CIRCUIT_BREAKER_COOLDOWN_SECONDS",
                defaults.risk.circuit_breaker_cooldown_seconds
            ),
        };
        risk.validate().context("invalid risk configuration")?;

        let ratelim = RateLimitConfig {
            max_requests: env_parsed!("RATELIM_MAX_REQUESTS", defaults.ratelim.max_requests),
            window_secs: env_parsed!("RATELIM_WINDOW_SECS", defaults.ratelim.window_secs),
            headroom_percent: env_parsed!("RATELIM_HEADROOM_PERCENT", defaults.ratelim.headroom_percent),
        };

        let backtest = BacktestSettings {
            initial_capital: env_parsed!("BACKTEST_INITIAL_CAPITAL", defaults.backtest.initial_capital),
            position_size_percent: env_parsed!("BACKTEST_POSITION_SIZE_PERCENT", defaults.backtest.position_size_percent),
            max_open_trades: env_parsed!("BACKTEST_MAX_OPEN_TRADES", defaults.backtest.max_open_trades),
            commission_percent: env_parsed!("BACKTEST_COMMISSION_PERCENT", defaults.backtest.commission_percent),
            slippage_percent: env_parsed!("BACKTEST_SLIPPAGE_PERCENT", defaults.backtest.slippage_percent),
            partial_exit_enabled: env_parsed!("BACKTEST_PARTIAL_EXIT_ENABLED", defaults.backtest.partial_exit_enabled),
            tp1_exit_percent: env_parsed!("BACKTEST_TP1_EXIT_PERCENT", defaults.backtest.tp1_exit_percent),
            tp2_exit_percent: env_parsed!("BACKTEST_TP2_EXIT_PERCENT", defaults.backtest.tp2_exit_percent),
        };

        let signal = SignalConfig {
            min_confluence_score: env_parsed!("SIGNAL_MIN_CONFLUENCE_SCORE", defaults.signal.min_confluence_score),
            min_pattern_score: env_parsed!("SIGNAL_MIN_PATTERN_SCORE", defaults.signal.min_pattern_score),
            min_agreement_percentage: env_parsed!("SIGNAL_MIN_AGREEMENT_PERCENTAGE", defaults.signal.min_agreement_percentage),
            min_risk_reward: env_parsed!("SIGNAL_MIN_RISK_REWARD", defaults.signal.min_risk_reward),
            max_stop_loss_percent: env_parsed!("SIGNAL_MAX_STOP_LOSS_PERCENT", defaults.signal.max_stop_loss_percent),
            use_atr_stops: env_parsed!("SIGNAL_USE_ATR_STOPS", defaults.signal.use_atr_stops),
            atr_multiplier: env_parsed!("SIGNAL_ATR_MULTIPLIER", defaults.signal.atr_multiplier),
            require_higher_tf_alignment: env_parsed!(
                "SIGNAL_REQUIRE_HIGHER_TF_ALIGNMENT",
                defaults.signal.require_higher_tf_alignment
            ),
        };

        let confluence = ConfluenceWeightsConfig {
            pattern: env_parsed!("CONFLUENCE_WEIGHT_PATTERN", defaults.confluence.pattern),
            structure: env_parsed!("CONFLUENCE_WEIGHT_STRUCTURE", defaults.confluence.structure),
            cycle: env_parsed!("CONFLUENCE_WEIGHT_CYCLE", defaults.confluence.cycle),
            timeframe: env_parsed!("CONFLUENCE_WEIGHT_TIMEFRAME", defaults.confluence.timeframe),
            zone: env_parsed!("CONFLUENCE_WEIGHT_ZONE", defaults.confluence.zone),
        };

        let detector = DetectorConfig {
            lookback: env_parsed!("DETECTOR_LOOKBACK", defaults.detector.lookback),
            min_swing_body_pct: env_parsed!("DETECTOR_MIN_SWING_BODY_PCT", defaults.detector.min_swing_body_pct),
            min_gap_size: env_parsed!("DETECTOR_MIN_GAP_SIZE", defaults.detector.min_gap_size),
            min_volume_percentile: env_parsed!("DETECTOR_MIN_VOLUME_PERCENTILE", defaults.detector.min_volume_percentile),
            min_move_size: env_parsed!("DETECTOR_MIN_MOVE_SIZE", defaults.detector.min_move_size),
            zone_merge_threshold: env_parsed!("DETECTOR_ZONE_MERGE_THRESHOLD", defaults.detector.zone_merge_threshold),
            min_touches: env_parsed!("DETECTOR_MIN_TOUCHES", defaults.detector.min_touches),
        };

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);

        Ok(Config {
            database_url,
            symbols,
            risk,
            ratelim,
            backtest,
            signal,
            confluence,
            detector,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_risk_validation() {
        let cfg = Config::default();
        assert!(cfg.risk.validate().is_ok());
    }

    #[test]
    fn confluence_weights_default_sums_to_one() {
        let w = ConfluenceWeightsConfig::default();
        let sum = w.pattern + w.structure + w.cycle + w.timeframe + w.zone;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
