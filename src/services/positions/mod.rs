//! Share position store
//!
//! Holdings per (user, market, outcome) with reservation accounting and
//! weighted-average cost. Mutations arrive as validated delta batches from
//! the settlement calculator; a batch either applies in full or not at all.
//!
//! Rows are created lazily on the first BUY fill. Cleared rows remain for
//! audit.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Outcome, Position};
use crate::services::error::TradeError;

/// A single mutation to one position row.
#[derive(Debug, Clone)]
pub enum PositionDelta {
    /// BUY fill: fold `quantity` at `price` into the weighted average.
    Add {
        user_id: String,
        market_id: Uuid,
        outcome: Outcome,
        quantity: Decimal,
        price: Decimal,
    },
    /// Earmark shares behind an open SELL order.
    Reserve {
        user_id: String,
        market_id: Uuid,
        outcome: Outcome,
        quantity: Decimal,
    },
    /// Return earmarked shares (order cancel / market cancel).
    Release {
        user_id: String,
        market_id: Uuid,
        outcome: Outcome,
        quantity: Decimal,
    },
    /// SELL fill: shares and reserved_shares move down in lockstep.
    ConsumeReserved {
        user_id: String,
        market_id: Uuid,
        outcome: Outcome,
        quantity: Decimal,
    },
    /// Resolution/cancel terminal clear.
    Clear {
        user_id: String,
        market_id: Uuid,
        outcome: Outcome,
    },
}

impl PositionDelta {
    fn key(&self) -> (String, Uuid, Outcome) {
        match self {
            PositionDelta::Add { user_id, market_id, outcome, .. }
            | PositionDelta::Reserve { user_id, market_id, outcome, .. }
            | PositionDelta::Release { user_id, market_id, outcome, .. }
            | PositionDelta::ConsumeReserved { user_id, market_id, outcome, .. }
            | PositionDelta::Clear { user_id, market_id, outcome } => {
                (user_id.clone(), *market_id, *outcome)
            }
        }
    }
}

pub struct PositionStore {
    inner: RwLock<HashMap<(String, Uuid, Outcome), Position>>,
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, user_id: &str, market_id: Uuid, outcome: Outcome) -> Option<Position> {
        self.inner
            .read()
            .get(&(user_id.to_string(), market_id, outcome))
            .cloned()
    }

    /// Shares the user could sell or reserve right now.
    pub fn available_shares(&self, user_id: &str, market_id: Uuid, outcome: Outcome) -> Decimal {
        self.get(user_id, market_id, outcome)
            .map(|p| p.available_shares())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn for_user(&self, user_id: &str) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .inner
            .read()
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        positions.sort_by_key(|p| (p.market_id, p.outcome as u8));
        positions
    }

    pub fn all(&self) -> Vec<Position> {
        self.inner.read().values().cloned().collect()
    }

    pub fn for_market(&self, market_id: Uuid) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .inner
            .read()
            .values()
            .filter(|p| p.market_id == market_id)
            .cloned()
            .collect();
        positions.sort_by(|a, b| (&a.user_id, a.outcome as u8).cmp(&(&b.user_id, b.outcome as u8)));
        positions
    }

    /// Validate a batch without applying it.
    pub fn check_batch(&self, deltas: &[PositionDelta]) -> Result<(), TradeError> {
        let inner = self.inner.read();
        Self::stage(&inner, deltas).map(|_| ())
    }

    /// Apply a batch atomically: stage every delta against a scratch copy of
    /// the touched rows, then commit. Invariants (`shares >= 0`,
    /// `0 <= reserved_shares <= shares`) are enforced on the staged result.
    pub fn apply_batch(&self, deltas: &[PositionDelta]) -> Result<(), TradeError> {
        if deltas.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write();
        let staged = Self::stage(&inner, deltas)?;
        for (key, position) in staged {
            inner.insert(key, position);
        }
        Ok(())
    }

    fn stage(
        rows: &HashMap<(String, Uuid, Outcome), Position>,
        deltas: &[PositionDelta],
    ) -> Result<HashMap<(String, Uuid, Outcome), Position>, TradeError> {
        let mut staged: HashMap<(String, Uuid, Outcome), Position> = HashMap::new();

        for delta in deltas {
            let key = delta.key();
            let mut position = staged
                .get(&key)
                .or_else(|| rows.get(&key))
                .cloned()
                .unwrap_or_else(|| Position::new(key.0.clone(), key.1, key.2));

            match delta {
                PositionDelta::Add { quantity, price, .. } => {
                    position.add(*quantity, *price);
                }
                PositionDelta::Reserve { quantity, .. } => {
                    if position.available_shares() < *quantity {
                        return Err(TradeError::InsufficientShares {
                            needed: *quantity,
                            available: position.available_shares(),
                        });
                    }
                    position.reserved_shares += *quantity;
                }
                PositionDelta::Release { quantity, .. } => {
                    if position.reserved_shares < *quantity {
                        return Err(TradeError::Invariant(format!(
                            "release of {} exceeds reserved shares {} for {} {:?}",
                            quantity, position.reserved_shares, position.user_id, position.outcome,
                        )));
                    }
                    position.reserved_shares -= *quantity;
                }
                PositionDelta::ConsumeReserved { quantity, .. } => {
                    if position.reserved_shares < *quantity || position.shares < *quantity {
                        return Err(TradeError::Invariant(format!(
                            "consume of {} exceeds holdings ({} shares, {} reserved) for {} {:?}",
                            quantity,
                            position.shares,
                            position.reserved_shares,
                            position.user_id,
                            position.outcome,
                        )));
                    }
                    position.shares -= *quantity;
                    position.reserved_shares -= *quantity;
                }
                PositionDelta::Clear { .. } => {
                    position.shares = Decimal::ZERO;
                    position.reserved_shares = Decimal::ZERO;
                }
            }

            if position.shares < Decimal::ZERO
                || position.reserved_shares < Decimal::ZERO
                || position.reserved_shares > position.shares
            {
                return Err(TradeError::Invariant(format!(
                    "position invariant broken for {} {:?}: shares {}, reserved {}",
                    position.user_id, position.outcome, position.shares, position.reserved_shares,
                )));
            }

            staged.insert(key, position);
        }

        Ok(staged)
    }

    /// Seed a position directly (recovery and dev seeding).
    pub fn load(&self, position: Position) {
        let key = (position.user_id.clone(), position.market_id, position.outcome);
        self.inner.write().insert(key, position);
    }
}
