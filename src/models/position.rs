//! Share position model
//!
//! One row per (user, market, outcome). `reserved_shares` is earmarked
//! against open SELL orders and never exceeds `shares`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::market::Outcome;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub user_id: String,
    pub market_id: Uuid,
    pub outcome: Outcome,

    /// Total shares held.
    pub shares: Decimal,

    /// Shares locked behind open SELL orders.
    pub reserved_shares: Decimal,

    /// Weighted-average acquisition price.
    pub avg_price: Decimal,
}

impl Position {
    pub fn new(user_id: impl Into<String>, market_id: Uuid, outcome: Outcome) -> Self {
        Self {
            user_id: user_id.into(),
            market_id,
            outcome,
            shares: Decimal::ZERO,
            reserved_shares: Decimal::ZERO,
            avg_price: Decimal::ZERO,
        }
    }

    /// Shares free to sell or reserve.
    pub fn available_shares(&self) -> Decimal {
        self.shares - self.reserved_shares
    }

    /// Fold `quantity` shares acquired at `price` into the weighted average.
    pub fn add(&mut self, quantity: Decimal, price: Decimal) {
        if self.shares.is_zero() {
            self.avg_price = price;
        } else {
            self.avg_price =
                (self.shares * self.avg_price + quantity * price) / (self.shares + quantity);
        }
        self.shares += quantity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_available_shares() {
        let mut pos = Position::new("bob", Uuid::new_v4(), Outcome::Yes);
        pos.shares = dec!(100);
        pos.reserved_shares = dec!(40);
        assert_eq!(pos.available_shares(), dec!(60));
    }

    #[test]
    fn test_add_sets_avg_price_from_zero() {
        let mut pos = Position::new("bob", Uuid::new_v4(), Outcome::Yes);
        pos.add(dec!(50), dec!(0.55));
        assert_eq!(pos.shares, dec!(50));
        assert_eq!(pos.avg_price, dec!(0.55));
    }

    #[test]
    fn test_add_weighted_average() {
        let mut pos = Position::new("bob", Uuid::new_v4(), Outcome::Yes);
        pos.add(dec!(100), dec!(0.40));
        pos.add(dec!(100), dec!(0.60));
        assert_eq!(pos.shares, dec!(200));
        assert_eq!(pos.avg_price, dec!(0.50));
    }
}
