//! Trade record model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::market::Outcome;
use super::order::OrderSide;

/// An executed match between a resting maker and an incoming taker.
///
/// `price` is always the maker's price; `taker_fee` is charged to the taker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub id: Uuid,
    pub market_id: Uuid,
    pub outcome: Outcome,

    pub price: Decimal,
    pub quantity: Decimal,

    pub maker_order_id: Uuid,
    pub taker_order_id: Uuid,
    pub maker_user_id: String,
    pub taker_user_id: String,

    /// Side of the taker order.
    pub taker_side: OrderSide,

    pub taker_fee: Decimal,

    pub created_at: DateTime<Utc>,
}

impl Trade {
    /// Cash value exchanged, excluding fees.
    pub fn value(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// Trade DTO with canonical decimal strings.
#[derive(Debug, Clone, Serialize)]
pub struct TradeResponse {
    pub trade_id: Uuid,
    pub market_id: Uuid,
    pub outcome: Outcome,
    pub price: Decimal,
    pub quantity: Decimal,
    pub taker_side: OrderSide,
    pub created_at: DateTime<Utc>,
}

impl From<&Trade> for TradeResponse {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.id,
            market_id: trade.market_id,
            outcome: trade.outcome,
            price: trade.price.normalize(),
            quantity: trade.quantity.normalize(),
            taker_side: trade.taker_side,
            created_at: trade.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_value() {
        let trade = Trade {
            id: Uuid::new_v4(),
            market_id: Uuid::new_v4(),
            outcome: Outcome::Yes,
            price: dec!(0.55),
            quantity: dec!(50),
            maker_order_id: Uuid::new_v4(),
            taker_order_id: Uuid::new_v4(),
            maker_user_id: "bob".to_string(),
            taker_user_id: "alice".to_string(),
            taker_side: OrderSide::Buy,
            taker_fee: dec!(0.275),
            created_at: Utc::now(),
        };
        assert_eq!(trade.value(), dec!(27.50));
    }
}
