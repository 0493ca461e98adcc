//! Matching engine
//!
//! Per-(market, outcome) limit order books with strict price-time priority.

pub mod book;
pub mod types;

pub use book::OrderBook;
pub use types::{AddOutcome, BookOrder, BookSnapshot, LevelSummary, Match, PriceLevel};
