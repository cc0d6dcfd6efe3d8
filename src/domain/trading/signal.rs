//! Trading signals: the output of confluence scoring, ready to be checked
//! against risk before becoming an order.
//!
//! Grounded on `application/strategies/traits.rs`'s `Signal` builder
//! (`Signal::buy(reason).with_confidence(..).with_stop_loss(..)`) and
//! `domain::trading::types::TradeProposal`'s field conventions.

use super::types::OrderSide;
use crate::domain::market::confluence::ConfluenceScore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub side: OrderSide,
    pub reason: String,
    pub confidence: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit_1: Option<Decimal>,
    pub take_profit_2: Option<Decimal>,
    pub take_profit_3: Option<Decimal>,
    pub confluence: Option<ConfluenceScore>,
    pub timestamp: i64,
}

impl Signal {
    pub fn new(symbol: impl Into<String>, side: OrderSide, reason: impl Into<String>, entry_price: Decimal, timestamp: i64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            reason: reason.into(),
            confidence: Decimal::ZERO,
            entry_price,
            stop_loss: None,
            take_profit_1: None,
            take_profit_2: None,
            take_profit_3: None,
            confluence: None,
            timestamp,
        }
    }

    pub fn buy(symbol: impl Into<String>, reason: impl Into<String>, entry_price: Decimal, timestamp: i64) -> Self {
        Self::new(symbol, OrderSide::Buy, reason, entry_price, timestamp)
    }

    pub fn sell(symbol: impl Into<String>, reason: impl Into<String>, entry_price: Decimal, timestamp: i64) -> Self {
        Self::new(symbol, OrderSide::Sell, reason, entry_price, timestamp)
    }

    pub fn with_confidence(mut self, confidence: Decimal) -> Self {
        self.confidence = confidence.clamp(Decimal::ZERO, Decimal::ONE);
        self
    }

    pub fn with_stop_loss(mut self, stop_loss: Decimal) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_take_profits(mut self, tp1: Decimal, tp2: Decimal, tp3: Decimal) -> Self {
        self.take_profit_1 = Some(tp1);
        self.take_profit_2 = Some(tp2);
        self.take_profit_3 = Some(tp3);
        self
    }

    pub fn with_confluence(mut self, score: ConfluenceScore) -> Self {
        self.confluence = Some(score);
        self
    }

    /// Risk per unit, used to size the position and compute R-multiples.
    pub fn risk_per_unit(&self) -> Option<Decimal> {
        self.stop_loss.map(|sl| (self.entry_price - sl).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn builder_chains_fields() {
        let signal = Signal::buy("BTC-USD", "bullish FVG + drive", dec!(100), 0)
            .with_confidence(dec!(1.5))
            .with_stop_loss(dec!(95))
            .with_take_profits(dec!(105), dec!(110), dec!(120));

        assert_eq!(signal.side, OrderSide::Buy);
        assert_eq!(signal.confidence, dec!(1)); // clamped
        assert_eq!(signal.risk_per_unit(), Some(dec!(5)));
        assert_eq!(signal.take_profit_2, Some(dec!(110)));
    }

    #[test]
    fn risk_per_unit_none_without_stop() {
        let signal = Signal::sell("BTC-USD", "bearish CHoCH", dec!(100), 0);
        assert_eq!(signal.risk_per_unit(), None);
    }
}
