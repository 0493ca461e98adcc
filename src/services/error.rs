//! Trading core error taxonomy
//!
//! Input and business errors reject with no state change. Invariant
//! violations indicate a bug; the coordinator aborts the event and the
//! hosting layer surfaces a generic internal error.

use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TradeError {
    #[error("market {0} not found")]
    MarketNotFound(Uuid),

    #[error("market {0} is not open")]
    MarketClosed(Uuid),

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("order does not belong to caller")]
    NotOwner,

    #[error("order is not cancellable")]
    NotCancellable,

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("invalid outcome: {0}")]
    InvalidOutcome(String),

    #[error("insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("insufficient shares: need {needed}, available {available}")]
    InsufficientShares { needed: Decimal, available: Decimal },

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("invariant violation: {0}")]
    Invariant(String),
}
