//! Circuit breaker: trips on daily-loss/drawdown/consecutive-loss limits
//! and auto-resets after a cooldown.
//!
//! Grounded on `circuit_breaker_service.rs`'s tripped-state + threshold
//! check shape, simplified from its four-level progressive halt (`Normal`/
//! `Warning`/`Reduced`/`FullHalt`) to a binary tripped/untripped model with
//! a cooldown-based auto-reset, matching this crate's simpler risk surface.

use crate::domain::risk::risk_config::RiskConfig;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripReason {
    DailyLossLimit,
    ConsecutiveLosses,
    ConsecutiveErrors,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    cooldown_seconds: i64,
    tripped: bool,
    tripped_at: Option<i64>,
    reason: Option<TripReason>,
    consecutive_losses: u32,
    consecutive_errors: u32,
}

impl CircuitBreaker {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            cooldown_seconds: config.circuit_breaker_cooldown_seconds,
            tripped: false,
            tripped_at: None,
            reason: None,
            consecutive_losses: 0,
            consecutive_errors: 0,
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn reason(&self) -> Option<&TripReason> {
        self.reason.as_ref()
    }

    fn trip(&mut self, reason: TripReason, now: i64) {
        self.tripped = true;
        self.tripped_at = Some(now);
        self.reason = Some(reason);
    }

    /// Re-check the cooldown and clear the tripped state once it has
    /// elapsed. Must be called before `is_tripped` is trusted for a new
    /// decision.
    pub fn tick(&mut self, now: i64) {
        if let (true, Some(tripped_at)) = (self.tripped, self.tripped_at) {
            if now - tripped_at >= self.cooldown_seconds {
                self.tripped = false;
                self.tripped_at = None;
                self.reason = None;
                self.consecutive_losses = 0;
                self.consecutive_errors = 0;
            }
        }
    }

    pub fn record_trade_result(&mut self, config: &RiskConfig, pnl: Decimal, now: i64) {
        if pnl < Decimal::ZERO {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
        if self.consecutive_losses >= config.max_consecutive_losses && !self.tripped {
            self.trip(TripReason::ConsecutiveLosses, now);
        }
    }

    pub fn record_order_error(&mut self, config: &RiskConfig, now: i64) {
        self.consecutive_errors += 1;
        if self.consecutive_errors >= config.max_consecutive_errors && !self.tripped {
            self.trip(TripReason::ConsecutiveErrors, now);
        }
    }

    pub fn record_order_success(&mut self) {
        self.consecutive_errors = 0;
    }

    pub fn check_daily_loss(&mut self, config: &RiskConfig, daily_loss: Decimal, now: i64) {
        if daily_loss >= config.max_daily_loss && !self.tripped {
            self.trip(TripReason::DailyLossLimit, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trips_after_consecutive_loss_limit() {
        let config = RiskConfig::default();
        let mut cb = CircuitBreaker::new(&config);
        for _ in 0..config.max_consecutive_losses {
            cb.record_trade_result(&config, dec!(-10), 0);
        }
        assert!(cb.is_tripped());
        assert_eq!(cb.reason(), Some(&TripReason::ConsecutiveLosses));
    }

    #[test]
    fn winning_trade_resets_loss_streak() {
        let config = RiskConfig::default();
        let mut cb = CircuitBreaker::new(&config);
        cb.record_trade_result(&config, dec!(-10), 0);
        cb.record_trade_result(&config, dec!(-10), 0);
        cb.record_trade_result(&config, dec!(5), 0);
        cb.record_trade_result(&config, dec!(-10), 0);
        assert!(!cb.is_tripped());
    }

    #[test]
    fn cooldown_clears_tripped_state() {
        let mut config = RiskConfig::default();
        config.circuit_breaker_cooldown_seconds = 100;
        let mut cb = CircuitBreaker::new(&config);
        for _ in 0..config.max_consecutive_losses {
            cb.record_trade_result(&config, dec!(-10), 0);
        }
        assert!(cb.is_tripped());
        cb.tick(50);
        assert!(cb.is_tripped());
        cb.tick(150);
        assert!(!cb.is_tripped());
    }

    #[test]
    fn daily_loss_limit_trips_breaker() {
        let config = RiskConfig::default();
        let mut cb = CircuitBreaker::new(&config);
        cb.check_daily_loss(&config, config.max_daily_loss, 0);
        assert!(cb.is_tripped());
        assert_eq!(cb.reason(), Some(&TripReason::DailyLossLimit));
    }
}
