//! `ManagedOrder`: the order-manager's view of an order from submission
//! through fill or terminal failure.

use super::types::{OrderSide, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
    StopMarket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedOrder {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub status: OrderStatus,
    pub created_at: i64,
    pub retries: u32,
    pub last_error: Option<String>,
}

impl ManagedOrder {
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        kind: OrderKind,
        quantity: Decimal,
        limit_price: Option<Decimal>,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            side,
            kind,
            quantity,
            limit_price,
            status: OrderStatus::PendingNew,
            created_at,
            retries: 0,
            last_error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::DoneForDay
        )
    }

    pub fn mark_rejected(&mut self, reason: impl Into<String>) {
        self.status = OrderStatus::Rejected;
        self.last_error = Some(reason.into());
    }

    pub fn mark_filled(&mut self) {
        self.status = OrderStatus::Filled;
    }

    /// Bump the retry counter on a transient failure; callers cap retries
    /// against the order manager's configured limit.
    pub fn retry(&mut self, reason: impl Into<String>) {
        self.retries += 1;
        self.last_error = Some(reason.into());
        self.status = OrderStatus::PendingNew;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_order_is_pending_and_not_terminal() {
        let order = ManagedOrder::new("1", "BTC-USD", OrderSide::Buy, OrderKind::Market, dec!(1), None, 0);
        assert_eq!(order.status, OrderStatus::PendingNew);
        assert!(!order.is_terminal());
    }

    #[test]
    fn rejected_order_is_terminal_with_reason() {
        let mut order = ManagedOrder::new("1", "BTC-USD", OrderSide::Buy, OrderKind::Market, dec!(1), None, 0);
        order.mark_rejected("insufficient margin");
        assert!(order.is_terminal());
        assert_eq!(order.last_error.as_deref(), Some("insufficient margin"));
    }

    #[test]
    fn retry_increments_counter_and_resets_status() {
        let mut order = ManagedOrder::new("1", "BTC-USD", OrderSide::Buy, OrderKind::Market, dec!(1), None, 0);
        order.status = OrderStatus::Rejected;
        order.retry("timeout");
        assert_eq!(order.retries, 1);
        assert_eq!(order.status, OrderStatus::PendingNew);
    }
}
