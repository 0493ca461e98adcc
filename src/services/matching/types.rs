//! Matching engine types

use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::models::OrderSide;

// ============================================================================
// Price level key
// ============================================================================

/// Fixed-point price key with 8 fractional digits for exact ordering and
/// equality inside the book. Prices in a binary market live in (0, 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceLevel(i64);

pub const PRICE_LEVEL_SCALE: i64 = 100_000_000;

impl PriceLevel {
    pub fn from_decimal(price: Decimal) -> Self {
        let scaled = price * Decimal::from(PRICE_LEVEL_SCALE);
        let truncated = scaled.trunc();
        let value = truncated.mantissa() / 10i128.pow(truncated.scale());
        PriceLevel(value as i64)
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(PRICE_LEVEL_SCALE)
    }
}

impl Ord for PriceLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for PriceLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// Book order
// ============================================================================

/// An order as it lives on the book. A slim projection of the order record:
/// the coordinator owns the full row, the book owns priority and remaining.
#[derive(Debug, Clone)]
pub struct BookOrder {
    pub id: Uuid,
    pub user_id: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub remaining: Decimal,
    /// Creation time in epoch milliseconds (audit; priority uses `seq`).
    pub timestamp_ms: i64,
    /// Arrival sequence; strictly increasing across accepted orders.
    pub seq: i64,
}

// ============================================================================
// Match output
// ============================================================================

/// One fill produced while crossing an incoming order. Executes at the
/// maker's price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub maker_order_id: Uuid,
    pub maker_user_id: String,
    /// Maker's limit price: the execution price.
    pub price: Decimal,
    pub quantity: Decimal,
    /// Maker remaining after this fill (0 means the maker left the book).
    pub maker_remaining: Decimal,
}

/// Result of submitting an order to the book.
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub matches: Vec<Match>,
    /// Taker quantity left after matching. If positive, the residual now
    /// rests on the book.
    pub remaining: Decimal,
}

impl AddOutcome {
    pub fn filled(&self) -> Decimal {
        self.matches.iter().map(|m| m.quantity).sum()
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// One aggregated price level of a snapshot.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LevelSummary {
    pub price: Decimal,
    pub quantity: Decimal,
    pub order_count: usize,
}

/// Aggregated view of one side-pair book.
#[derive(Debug, Clone, Serialize)]
pub struct BookSnapshot {
    /// Best-priced first (descending for bids).
    pub bids: Vec<LevelSummary>,
    /// Best-priced first (ascending for asks).
    pub asks: Vec<LevelSummary>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub midpoint: Option<Decimal>,
}
