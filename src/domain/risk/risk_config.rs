//! Risk management configuration.
//!
//! Re-fielded from the teacher's `RiskConfig` (which carried equity-market
//! concerns — PDT, sector exposure, sentiment, correlation, volatility —
//! with no counterpart here) to the notional/exposure/consecutive-failure
//! surface this crate's risk manager actually checks.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskConfigError {
    #[error("invalid RiskConfig: {0}")]
    Validation(String),
}

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub max_order_notional: Decimal,
    pub max_position_size_usd: Decimal,
    pub max_position_size_percent: Decimal,
    pub max_total_exposure: Decimal,
    pub max_exposure_percent: Decimal,
    pub max_positions: usize,
    pub max_open_orders: usize,
    pub max_daily_loss: Decimal,
    pub max_daily_loss_percent: Decimal,
    pub max_consecutive_losses: u32,
    pub max_consecutive_errors: u32,
    pub max_price_deviation_percent: Decimal,
    pub circuit_breaker_cooldown_seconds: i64,
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        if self.max_order_notional <= Decimal::ZERO {
            return Err(RiskConfigError::Validation(
                "max_order_notional must be > 0".into(),
            ));
        }
        if self.max_position_size_percent <= Decimal::ZERO || self.max_position_size_percent > Decimal::ONE {
            return Err(RiskConfigError::Validation(
                "max_position_size_percent must be in (0, 1]".into(),
            ));
        }
        if self.max_exposure_percent <= Decimal::ZERO || self.max_exposure_percent > Decimal::ONE {
            return Err(RiskConfigError::Validation(
                "max_exposure_percent must be in (0, 1]".into(),
            ));
        }
        if self.max_positions == 0 {
            return Err(RiskConfigError::Validation("max_positions must be > 0".into()));
        }
        if self.max_open_orders == 0 {
            return Err(RiskConfigError::Validation(
                "max_open_orders must be > 0".into(),
            ));
        }
        if self.max_daily_loss_percent <= Decimal::ZERO || self.max_daily_loss_percent > Decimal::ONE {
            return Err(RiskConfigError::Validation(
                "max_daily_loss_percent must be in (0, 1]".into(),
            ));
        }
        if self.max_consecutive_losses == 0 {
            return Err(RiskConfigError::Validation(
                "max_consecutive_losses must be > 0".into(),
            ));
        }
        if self.circuit_breaker_cooldown_seconds <= 0 {
            return Err(RiskConfigError::Validation(
                "circuit_breaker_cooldown_seconds must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_order_notional: dec!(10_000),
            max_position_size_usd: dec!(25_000),
            max_position_size_percent: dec!(0.20),
            max_total_exposure: dec!(100_000),
            max_exposure_percent: dec!(0.80),
            max_positions: 10,
            max_open_orders: 20,
            max_daily_loss: dec!(5_000),
            max_daily_loss_percent: dec!(0.05),
            max_consecutive_losses: 3,
            max_consecutive_errors: 5,
            max_price_deviation_percent: dec!(0.05),
            circuit_breaker_cooldown_seconds: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RiskConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_notional_fails_validation() {
        let mut cfg = RiskConfig::default();
        cfg.max_order_notional = Decimal::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_percent_fails_validation() {
        let mut cfg = RiskConfig::default();
        cfg.max_exposure_percent = dec!(1.5);
        assert!(cfg.validate().is_err());
    }
}
