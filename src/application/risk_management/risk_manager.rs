//! Pre-trade risk checks and the circuit breaker, composed into a single
//! entry point.
//!
//! Grounded on the teacher's `RiskManager` as an owning coordinator of
//! named sub-services, re-ordered to the fixed check sequence this crate
//! needs: circuit breaker -> notional -> position size -> exposure ->
//! position/order counts -> price deviation.

use super::circuit_breaker::CircuitBreaker;
use crate::domain::risk::risk_config::RiskConfig;
use crate::domain::trading::position::Position;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskRejection {
    CircuitBreakerTripped,
    OrderNotionalExceeded,
    PositionSizeExceeded,
    TotalExposureExceeded,
    TooManyOpenPositions,
    TooManyOpenOrders,
    PriceDeviationExceeded,
}

impl std::fmt::Display for RiskRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            RiskRejection::CircuitBreakerTripped => "circuit breaker is tripped",
            RiskRejection::OrderNotionalExceeded => "order notional exceeds max_order_notional",
            RiskRejection::PositionSizeExceeded => "resulting position exceeds size limits",
            RiskRejection::TotalExposureExceeded => "resulting total exposure exceeds limits",
            RiskRejection::TooManyOpenPositions => "max_positions reached",
            RiskRejection::TooManyOpenOrders => "max_open_orders reached",
            RiskRejection::PriceDeviationExceeded => "order price deviates too far from reference",
        };
        write!(f, "{msg}")
    }
}

pub struct OrderRequest<'a> {
    pub symbol: &'a str,
    pub notional: Decimal,
    pub reference_price: Decimal,
    pub order_price: Decimal,
}

pub struct RiskManager {
    config: RiskConfig,
    circuit_breaker: CircuitBreaker,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        let circuit_breaker = CircuitBreaker::new(&config);
        Self {
            config,
            circuit_breaker,
        }
    }

    pub fn circuit_breaker_mut(&mut self) -> &mut CircuitBreaker {
        &mut self.circuit_breaker
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Run the fixed check sequence. `positions`/`open_order_count`/
    /// `account_equity` reflect state *before* this order is applied.
    pub fn check_order(
        &mut self,
        request: &OrderRequest,
        positions: &HashMap<String, Position>,
        open_order_count: usize,
        account_equity: Decimal,
        now: i64,
    ) -> Result<(), RiskRejection> {
        self.circuit_breaker.tick(now);
        if self.circuit_breaker.is_tripped() {
            return Err(RiskRejection::CircuitBreakerTripped);
        }

        if request.notional > self.config.max_order_notional {
            return Err(RiskRejection::OrderNotionalExceeded);
        }

        let existing_notional = positions
            .get(request.symbol)
            .map(|p| p.notional(request.reference_price))
            .unwrap_or(Decimal::ZERO);
        let resulting_position_notional = existing_notional + request.notional;
        if resulting_position_notional > self.config.max_position_size_usd {
            return Err(RiskRejection::PositionSizeExceeded);
        }
        if !account_equity.is_zero()
            && resulting_position_notional / account_equity > self.config.max_position_size_percent
        {
            return Err(RiskRejection::PositionSizeExceeded);
        }

        let total_exposure: Decimal = positions
            .values()
            .map(|p| p.notional(request.reference_price))
            .sum::<Decimal>()
            + request.notional;
        if total_exposure > self.config.max_total_exposure {
            return Err(RiskRejection::TotalExposureExceeded);
        }
        if !account_equity.is_zero() && total_exposure / account_equity > self.config.max_exposure_percent {
            return Err(RiskRejection::TotalExposureExceeded);
        }

        let opening_new_position = !positions.contains_key(request.symbol);
        if opening_new_position && positions.len() >= self.config.max_positions {
            return Err(RiskRejection::TooManyOpenPositions);
        }
        if open_order_count >= self.config.max_open_orders {
            return Err(RiskRejection::TooManyOpenOrders);
        }

        if !request.reference_price.is_zero() {
            let deviation = ((request.order_price - request.reference_price) / request.reference_price).abs();
            if deviation > self.config.max_price_deviation_percent {
                return Err(RiskRejection::PriceDeviationExceeded);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn manager() -> RiskManager {
        RiskManager::new(RiskConfig::default())
    }

    #[test]
    fn approves_order_within_all_limits() {
        let mut rm = manager();
        let request = OrderRequest {
            symbol: "BTC-USD",
            notional: dec!(1_000),
            reference_price: dec!(50_000),
            order_price: dec!(50_010),
        };
        assert!(rm
            .check_order(&request, &HashMap::new(), 0, dec!(100_000), 0)
            .is_ok());
    }

    #[test]
    fn rejects_order_over_notional_cap() {
        let mut rm = manager();
        let request = OrderRequest {
            symbol: "BTC-USD",
            notional: dec!(50_000),
            reference_price: dec!(50_000),
            order_price: dec!(50_000),
        };
        assert_eq!(
            rm.check_order(&request, &HashMap::new(), 0, dec!(1_000_000), 0),
            Err(RiskRejection::OrderNotionalExceeded)
        );
    }

    #[test]
    fn rejects_when_circuit_breaker_tripped() {
        let mut rm = manager();
        for _ in 0..rm.config().max_consecutive_losses {
            rm.circuit_breaker_mut()
                .record_trade_result(&RiskConfig::default(), dec!(-10), 0);
        }
        let request = OrderRequest {
            symbol: "BTC-USD",
            notional: dec!(100),
            reference_price: dec!(50_000),
            order_price: dec!(50_000),
        };
        assert_eq!(
            rm.check_order(&request, &HashMap::new(), 0, dec!(100_000), 0),
            Err(RiskRejection::CircuitBreakerTripped)
        );
    }

    #[test]
    fn rejects_price_far_from_reference() {
        let mut rm = manager();
        let request = OrderRequest {
            symbol: "BTC-USD",
            notional: dec!(100),
            reference_price: dec!(50_000),
            order_price: dec!(60_000),
        };
        assert_eq!(
            rm.check_order(&request, &HashMap::new(), 0, dec!(100_000), 0),
            Err(RiskRejection::PriceDeviationExceeded)
        );
    }
}
