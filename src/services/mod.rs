//! Core services: ledger, positions, matching, settlement, coordination.

pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod matching;
pub mod positions;
pub mod settlement;

pub use coordinator::{TradingConfig, TradingCoordinator};
pub use error::TradeError;
