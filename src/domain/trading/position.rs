//! Position tracking: fill-by-fill average-entry accounting.
//!
//! Grounded directly on `domain::trading::portfolio::Portfolio`/`Position`
//! (average-price recomputation, realized/unrealized P&L), generalized from
//! an equity-snapshot model to a fill-driven state machine that handles an
//! opposite-side fill larger than the current position by flipping sides.

use super::types::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub average_entry_price: Decimal,
    pub realized_pnl: Decimal,
}

impl Position {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Buy,
            quantity: Decimal::ZERO,
            average_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Apply a fill. A same-side fill recomputes the weighted average
    /// entry price; an opposite-side fill realizes P&L on the overlapping
    /// quantity and, if it exceeds the current position, flips the
    /// position to the opposite side with the remainder as the new entry.
    pub fn apply_fill(&mut self, fill: &Fill) {
        if self.is_flat() {
            self.side = fill.side;
            self.quantity = fill.quantity;
            self.average_entry_price = fill.price;
            return;
        }

        if fill.side == self.side {
            let total_cost = self.average_entry_price * self.quantity + fill.price * fill.quantity;
            self.quantity += fill.quantity;
            self.average_entry_price = total_cost / self.quantity;
            return;
        }

        let closing_qty = fill.quantity.min(self.quantity);
        let pnl = match self.side {
            OrderSide::Buy => (fill.price - self.average_entry_price) * closing_qty,
            OrderSide::Sell => (self.average_entry_price - fill.price) * closing_qty,
        };
        self.realized_pnl += pnl;
        self.quantity -= closing_qty;

        let remainder = fill.quantity - closing_qty;
        if remainder > Decimal::ZERO {
            self.side = fill.side;
            self.quantity = remainder;
            self.average_entry_price = fill.price;
        } else if self.quantity.is_zero() {
            self.average_entry_price = Decimal::ZERO;
        }
    }

    pub fn unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        if self.is_flat() {
            return Decimal::ZERO;
        }
        match self.side {
            OrderSide::Buy => (current_price - self.average_entry_price) * self.quantity,
            OrderSide::Sell => (self.average_entry_price - current_price) * self.quantity,
        }
    }

    pub fn notional(&self, current_price: Decimal) -> Decimal {
        self.quantity * current_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fill(side: OrderSide, price: Decimal, qty: Decimal) -> Fill {
        Fill {
            side,
            price,
            quantity: qty,
            timestamp: 0,
        }
    }

    #[test]
    fn first_fill_opens_position() {
        let mut pos = Position::flat("BTC-USD");
        pos.apply_fill(&fill(OrderSide::Buy, dec!(100), dec!(2)));
        assert_eq!(pos.quantity, dec!(2));
        assert_eq!(pos.average_entry_price, dec!(100));
    }

    #[test]
    fn same_side_fill_averages_entry_price() {
        let mut pos = Position::flat("BTC-USD");
        pos.apply_fill(&fill(OrderSide::Buy, dec!(100), dec!(2)));
        pos.apply_fill(&fill(OrderSide::Buy, dec!(110), dec!(2)));
        assert_eq!(pos.quantity, dec!(4));
        assert_eq!(pos.average_entry_price, dec!(105));
    }

    #[test]
    fn opposite_fill_partially_closes_and_realizes_pnl() {
        let mut pos = Position::flat("BTC-USD");
        pos.apply_fill(&fill(OrderSide::Buy, dec!(100), dec!(2)));
        pos.apply_fill(&fill(OrderSide::Sell, dec!(110), dec!(1)));
        assert_eq!(pos.quantity, dec!(1));
        assert_eq!(pos.realized_pnl, dec!(10));
        assert_eq!(pos.side, OrderSide::Buy);
    }

    #[test]
    fn oversized_opposite_fill_flips_position() {
        let mut pos = Position::flat("BTC-USD");
        pos.apply_fill(&fill(OrderSide::Buy, dec!(100), dec!(2)));
        pos.apply_fill(&fill(OrderSide::Sell, dec!(110), dec!(3)));
        assert_eq!(pos.side, OrderSide::Sell);
        assert_eq!(pos.quantity, dec!(1));
        assert_eq!(pos.average_entry_price, dec!(110));
        assert_eq!(pos.realized_pnl, dec!(20));
    }

    #[test]
    fn exact_close_zeroes_average_price() {
        let mut pos = Position::flat("BTC-USD");
        pos.apply_fill(&fill(OrderSide::Buy, dec!(100), dec!(2)));
        pos.apply_fill(&fill(OrderSide::Sell, dec!(105), dec!(2)));
        assert!(pos.is_flat());
        assert_eq!(pos.average_entry_price, dec!(0));
    }
}
