//! Settlement calculator
//!
//! Pure plan builders for trades, cancels, and market lifecycle events.

pub mod plan;

pub use plan::{
    buy_reserve, market_cancel, order_cancel, order_release, resolution, trade, SettlementPlan,
    TradeTerms,
};
