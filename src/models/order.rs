//! Order model
//!
//! Limit orders only. An order reserves collateral (BUY) or shares (SELL)
//! while open; the remaining quantity decrements exactly as matches execute.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use super::market::Outcome;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_side", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            _ => Err(format!("Invalid order side: {}", s)),
        }
    }
}

/// Order status.
///
/// `Open -> Partial -> Filled` through matches; `Cancelled` by the user or a
/// market lifecycle event. `Filled` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Open,
    Partial,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// An order that can still rest on the book or be cancelled.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Partial)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::Partial => "PARTIAL",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// A limit order.
///
/// Invariants: `0 <= remaining <= quantity`; `status == Filled` iff
/// `remaining == 0`; `status == Partial` implies `0 < remaining < quantity`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,

    pub user_id: String,

    pub market_id: Uuid,

    pub outcome: Outcome,

    pub side: OrderSide,

    /// Probability price in (0, 1).
    pub price: Decimal,

    /// Original quantity in shares.
    pub quantity: Decimal,

    /// Unfilled quantity in shares.
    pub remaining: Decimal,

    pub status: OrderStatus,

    pub created_at: DateTime<Utc>,

    /// Process-wide arrival sequence; total order over same-timestamp orders.
    #[serde(skip)]
    #[sqlx(default)]
    pub seq: i64,
}

impl Order {
    pub fn filled(&self) -> Decimal {
        self.quantity - self.remaining
    }

    /// Collateral a BUY order holds reserved while open.
    pub fn reserved_value(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => self.remaining * self.price,
            OrderSide::Sell => Decimal::ZERO,
        }
    }

    pub fn is_cancellable(&self) -> bool {
        self.status.is_active() && self.remaining > Decimal::ZERO
    }

    /// Derive the status implied by the current remaining quantity.
    pub fn derived_status(&self) -> OrderStatus {
        if self.status == OrderStatus::Cancelled {
            OrderStatus::Cancelled
        } else if self.remaining.is_zero() {
            OrderStatus::Filled
        } else if self.remaining < self.quantity {
            OrderStatus::Partial
        } else {
            OrderStatus::Open
        }
    }
}

/// Place order request.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: String,
    pub market_id: Uuid,
    pub outcome: Outcome,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Order response DTO.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub market_id: Uuid,
    pub outcome: Outcome,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub filled: Decimal,
    pub remaining: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            market_id: order.market_id,
            outcome: order.outcome,
            side: order.side,
            price: order.price.normalize(),
            quantity: order.quantity.normalize(),
            filled: order.filled().normalize(),
            remaining: order.remaining.normalize(),
            status: order.status,
            created_at: order.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_order(side: OrderSide, quantity: Decimal, remaining: Decimal) -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: "alice".to_string(),
            market_id: Uuid::new_v4(),
            outcome: Outcome::Yes,
            side,
            price: dec!(0.60),
            quantity,
            remaining,
            status: OrderStatus::Open,
            created_at: Utc::now(),
            seq: 1,
        }
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_filled_and_reserved_value() {
        let order = sample_order(OrderSide::Buy, dec!(100), dec!(40));
        assert_eq!(order.filled(), dec!(60));
        assert_eq!(order.reserved_value(), dec!(24));

        let sell = sample_order(OrderSide::Sell, dec!(100), dec!(40));
        assert_eq!(sell.reserved_value(), Decimal::ZERO);
    }

    #[test]
    fn test_derived_status() {
        let mut order = sample_order(OrderSide::Buy, dec!(100), dec!(100));
        assert_eq!(order.derived_status(), OrderStatus::Open);

        order.remaining = dec!(40);
        assert_eq!(order.derived_status(), OrderStatus::Partial);

        order.remaining = Decimal::ZERO;
        assert_eq!(order.derived_status(), OrderStatus::Filled);

        order.status = OrderStatus::Cancelled;
        assert_eq!(order.derived_status(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_is_cancellable() {
        let mut order = sample_order(OrderSide::Buy, dec!(100), dec!(100));
        assert!(order.is_cancellable());

        order.remaining = Decimal::ZERO;
        order.status = OrderStatus::Filled;
        assert!(!order.is_cancellable());

        let mut cancelled = sample_order(OrderSide::Sell, dec!(50), dec!(20));
        cancelled.status = OrderStatus::Cancelled;
        assert!(!cancelled.is_cancellable());
    }
}
