//! Order lifecycle management: risk-gated submission, retry on transient
//! failure, fill application onto positions.
//!
//! Grounded on `order_reconciler.rs`'s pending-order tracking and
//! `order_retry_strategy.rs`'s submit/fail/retry shape.

use super::risk_manager::{OrderRequest, RiskManager, RiskRejection};
use crate::domain::trading::order::{ManagedOrder, OrderKind};
use crate::domain::trading::position::{Fill, Position};
use crate::domain::trading::types::OrderSide;
use rust_decimal::Decimal;
use std::collections::HashMap;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    Risk(RiskRejection),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Risk(r) => write!(f, "rejected by risk manager: {r}"),
        }
    }
}

pub struct OrderManager {
    pending: HashMap<String, ManagedOrder>,
    positions: HashMap<String, Position>,
}

impl OrderManager {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    pub fn open_order_count(&self) -> usize {
        self.pending.values().filter(|o| !o.is_terminal()).count()
    }

    /// Run risk checks, and if approved, park the order as pending.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &mut self,
        risk_manager: &mut RiskManager,
        id: impl Into<String>,
        symbol: &str,
        side: OrderSide,
        kind: OrderKind,
        quantity: Decimal,
        reference_price: Decimal,
        order_price: Decimal,
        account_equity: Decimal,
        now: i64,
    ) -> Result<(), SubmitError> {
        let request = OrderRequest {
            symbol,
            notional: quantity * order_price,
            reference_price,
            order_price,
        };
        risk_manager
            .check_order(&request, &self.positions, self.open_order_count(), account_equity, now)
            .map_err(SubmitError::Risk)?;

        let order = ManagedOrder::new(
            id,
            symbol,
            side,
            kind,
            quantity,
            Some(order_price),
            now,
        );
        self.pending.insert(order.id.clone(), order);
        Ok(())
    }

    /// Apply an exchange fill for `order_id`, updating the order status and
    /// the symbol's position.
    pub fn apply_fill(&mut self, order_id: &str, fill_price: Decimal, fill_quantity: Decimal, timestamp: i64) {
        let Some(order) = self.pending.get_mut(order_id) else {
            return;
        };
        order.mark_filled();
        let symbol = order.symbol.clone();
        let side = order.side;

        let position = self
            .positions
            .entry(symbol.clone())
            .or_insert_with(|| Position::flat(&symbol));
        position.apply_fill(&Fill {
            side,
            price: fill_price,
            quantity: fill_quantity,
            timestamp,
        });
        if position.is_flat() {
            self.positions.remove(&symbol);
        }
    }

    /// Retry a transiently-failed order, or give up past the retry cap.
    pub fn handle_failure(&mut self, order_id: &str, reason: impl Into<String>) -> bool {
        let Some(order) = self.pending.get_mut(order_id) else {
            return false;
        };
        if order.retries >= MAX_RETRIES {
            order.mark_rejected(reason);
            false
        } else {
            order.retry(reason);
            true
        }
    }

    pub fn order(&self, order_id: &str) -> Option<&ManagedOrder> {
        self.pending.get(order_id)
    }
}

impl Default for OrderManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::risk::risk_config::RiskConfig;
    use rust_decimal_macros::dec;

    #[test]
    fn submit_then_fill_opens_a_position() {
        let mut om = OrderManager::new();
        let mut rm = RiskManager::new(RiskConfig::default());
        om.submit(
            &mut rm,
            "o1",
            "BTC-USD",
            OrderSide::Buy,
            OrderKind::Market,
            dec!(1),
            dec!(50_000),
            dec!(50_000),
            dec!(100_000),
            0,
        )
        .unwrap();
        om.apply_fill("o1", dec!(50_010), dec!(1), 1);
        assert_eq!(om.positions().get("BTC-USD").unwrap().quantity, dec!(1));
        assert_eq!(om.order("o1").unwrap().status, crate::domain::trading::types::OrderStatus::Filled);
    }

    #[test]
    fn submit_rejected_by_risk_manager_is_not_pending() {
        let mut om = OrderManager::new();
        let mut rm = RiskManager::new(RiskConfig::default());
        let result = om.submit(
            &mut rm,
            "o1",
            "BTC-USD",
            OrderSide::Buy,
            OrderKind::Market,
            dec!(100),
            dec!(50_000),
            dec!(50_000),
            dec!(1_000_000),
            0,
        );
        assert!(result.is_err());
        assert!(om.order("o1").is_none());
    }

    #[test]
    fn handle_failure_retries_until_cap_then_rejects() {
        let mut om = OrderManager::new();
        let mut rm = RiskManager::new(RiskConfig::default());
        om.submit(
            &mut rm,
            "o1",
            "BTC-USD",
            OrderSide::Buy,
            OrderKind::Market,
            dec!(1),
            dec!(50_000),
            dec!(50_000),
            dec!(100_000),
            0,
        )
        .unwrap();
        for _ in 0..MAX_RETRIES {
            assert!(om.handle_failure("o1", "timeout"));
        }
        assert!(!om.handle_failure("o1", "timeout"));
        assert!(om.order("o1").unwrap().is_terminal());
    }
}
