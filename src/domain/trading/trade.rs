//! A completed (or partially-closed) trade record, as produced by the
//! backtest engine and the live order manager alike.

use super::types::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit1,
    TakeProfit2,
    TakeProfit3,
    Breakeven,
    CircuitBreaker,
    ManualClose,
    EndOfBacktest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialExit {
    pub reason: ExitReason,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub strategy_name: String,
    pub entry_price: Decimal,
    pub entry_quantity: Decimal,
    pub entry_timestamp: i64,
    pub entry_reason: String,
    pub stop_loss: Option<Decimal>,
    pub partial_exits: Vec<PartialExit>,
    pub exit_timestamp: Option<i64>,
    pub realized_pnl: Decimal,
    pub fees_paid: Decimal,
    pub slippage_paid: Decimal,
}

impl Trade {
    pub fn open(
        id: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        strategy_name: impl Into<String>,
        entry_price: Decimal,
        entry_quantity: Decimal,
        entry_timestamp: i64,
        entry_reason: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            side,
            strategy_name: strategy_name.into(),
            entry_price,
            entry_quantity,
            entry_timestamp,
            entry_reason: entry_reason.into(),
            stop_loss: None,
            partial_exits: Vec::new(),
            exit_timestamp: None,
            realized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
            slippage_paid: Decimal::ZERO,
        }
    }

    pub fn quantity_remaining(&self) -> Decimal {
        self.entry_quantity - self.partial_exits.iter().map(|e| e.quantity).sum::<Decimal>()
    }

    pub fn is_closed(&self) -> bool {
        self.quantity_remaining() <= Decimal::ZERO
    }

    pub fn apply_exit(&mut self, reason: ExitReason, price: Decimal, quantity: Decimal, timestamp: i64) {
        let quantity = quantity.min(self.quantity_remaining());
        let pnl = match self.side {
            OrderSide::Buy => (price - self.entry_price) * quantity,
            OrderSide::Sell => (self.entry_price - price) * quantity,
        };
        self.realized_pnl += pnl;
        self.partial_exits.push(PartialExit {
            reason,
            price,
            quantity,
            timestamp,
        });
        if self.is_closed() {
            self.exit_timestamp = Some(timestamp);
        }
    }

    /// Realized P&L expressed in multiples of the original stop distance,
    /// used for outcome-analysis rating and backtest metrics.
    pub fn r_multiple(&self) -> Option<Decimal> {
        let stop = self.stop_loss?;
        let risk_per_unit = (self.entry_price - stop).abs();
        if risk_per_unit.is_zero() {
            return None;
        }
        Some(self.realized_pnl / (risk_per_unit * self.entry_quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn partial_exit_reduces_remaining_quantity() {
        let mut trade = Trade::open("1", "BTC-USD", OrderSide::Buy, "confluence-v1", dec!(100), dec!(3), 0, "entry");
        trade.apply_exit(ExitReason::TakeProfit1, dec!(110), dec!(1), 10);
        assert_eq!(trade.quantity_remaining(), dec!(2));
        assert_eq!(trade.realized_pnl, dec!(10));
        assert!(!trade.is_closed());
    }

    #[test]
    fn final_exit_closes_trade_and_stamps_timestamp() {
        let mut trade = Trade::open("1", "BTC-USD", OrderSide::Buy, "confluence-v1", dec!(100), dec!(1), 0, "entry");
        trade.apply_exit(ExitReason::StopLoss, dec!(95), dec!(1), 5);
        assert!(trade.is_closed());
        assert_eq!(trade.exit_timestamp, Some(5));
        assert_eq!(trade.realized_pnl, dec!(-5));
    }

    #[test]
    fn r_multiple_uses_stop_distance() {
        let mut trade = Trade::open("1", "BTC-USD", OrderSide::Buy, "confluence-v1", dec!(100), dec!(1), 0, "entry");
        trade.stop_loss = Some(dec!(90));
        trade.apply_exit(ExitReason::TakeProfit1, dec!(120), dec!(1), 5);
        assert_eq!(trade.r_multiple(), Some(dec!(2)));
    }

    #[test]
    fn sell_side_pnl_is_inverted() {
        let mut trade = Trade::open("1", "BTC-USD", OrderSide::Sell, "confluence-v1", dec!(100), dec!(1), 0, "entry");
        trade.apply_exit(ExitReason::TakeProfit1, dec!(90), dec!(1), 5);
        assert_eq!(trade.realized_pnl, dec!(10));
    }
}
