//! Collateral ledger
//!
//! Append-only balance-delta log plus the current-balance projection.
//! Balances split into `available` and `reserved`; every write goes through
//! `apply`/`apply_batch`, which validate the whole batch against the
//! non-negativity invariants before committing any of it. Partial success is
//! impossible.
//!
//! Accounts are created exactly once via `open_account`; applying a delta to
//! a missing account is an error rather than an implicit upsert, so a typo'd
//! user id can never silently mint a balance row. The configured system
//! account is the fee sink and the settlement counterparty; it is the single
//! account exempt from the non-negativity check (house float).

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::models::{Balance, BalanceDelta, LedgerEntry};
use crate::services::error::TradeError;

struct LedgerInner {
    balances: HashMap<String, Balance>,
    entries: Vec<LedgerEntry>,
    next_entry_id: i64,
}

pub struct Ledger {
    system_account: String,
    inner: RwLock<LedgerInner>,
}

impl Ledger {
    pub fn new(system_account: impl Into<String>) -> Self {
        let system_account = system_account.into();
        let mut balances = HashMap::new();
        balances.insert(system_account.clone(), Balance::default());

        Self {
            system_account,
            inner: RwLock::new(LedgerInner {
                balances,
                entries: Vec::new(),
                next_entry_id: 1,
            }),
        }
    }

    pub fn system_account(&self) -> &str {
        &self.system_account
    }

    /// Create the balance row for a user. Idempotent.
    pub fn open_account(&self, user_id: &str) {
        let mut inner = self.inner.write();
        inner
            .balances
            .entry(user_id.to_string())
            .or_insert_with(Balance::default);
    }

    pub fn has_account(&self, user_id: &str) -> bool {
        self.inner.read().balances.contains_key(user_id)
    }

    /// Current balance, zero for unknown users (read-only convenience).
    pub fn balance(&self, user_id: &str) -> Balance {
        self.inner
            .read()
            .balances
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Apply a single delta atomically.
    pub fn apply(&self, delta: BalanceDelta) -> Result<LedgerEntry, TradeError> {
        self.apply_batch(vec![delta])
            .map(|mut entries| entries.remove(0))
    }

    /// Apply a batch of deltas under one critical section: either every delta
    /// commits and an entry is appended for each, or nothing changes.
    pub fn apply_batch(&self, deltas: Vec<BalanceDelta>) -> Result<Vec<LedgerEntry>, TradeError> {
        if deltas.is_empty() {
            return Ok(Vec::new());
        }

        let mut inner = self.inner.write();
        let staged = Self::stage(&inner.balances, &deltas, &self.system_account)?;

        for (user_id, balance) in staged {
            inner.balances.insert(user_id, balance);
        }

        let now = Utc::now();
        let mut written = Vec::with_capacity(deltas.len());
        for delta in deltas {
            let entry = LedgerEntry {
                id: inner.next_entry_id,
                user_id: delta.user_id,
                delta_available: delta.delta_available,
                delta_reserved: delta.delta_reserved,
                reason: delta.reason,
                ref_type: delta.ref_type,
                ref_id: delta.ref_id,
                created_at: now,
            };
            inner.next_entry_id += 1;
            debug!(
                user = %entry.user_id,
                reason = %entry.reason,
                d_available = %entry.delta_available,
                d_reserved = %entry.delta_reserved,
                "ledger entry"
            );
            inner.entries.push(entry.clone());
            written.push(entry);
        }

        Ok(written)
    }

    /// Validate a batch without applying it.
    pub fn check_batch(&self, deltas: &[BalanceDelta]) -> Result<(), TradeError> {
        let inner = self.inner.read();
        Self::stage(&inner.balances, deltas, &self.system_account).map(|_| ())
    }

    /// Compute the post-batch balances, rejecting on a missing account or a
    /// would-be-negative component.
    fn stage(
        balances: &HashMap<String, Balance>,
        deltas: &[BalanceDelta],
        system_account: &str,
    ) -> Result<HashMap<String, Balance>, TradeError> {
        let mut staged: HashMap<String, Balance> = HashMap::new();

        for delta in deltas {
            let current = match staged.get(&delta.user_id) {
                Some(balance) => balance.clone(),
                None => balances
                    .get(&delta.user_id)
                    .cloned()
                    .ok_or_else(|| TradeError::UnknownAccount(delta.user_id.clone()))?,
            };

            let next = Balance {
                available: current.available + delta.delta_available,
                reserved: current.reserved + delta.delta_reserved,
            };

            if delta.user_id != system_account
                && (next.available < Decimal::ZERO || next.reserved < Decimal::ZERO)
            {
                return Err(TradeError::Invariant(format!(
                    "balance for {} would go negative (available {}, reserved {}) applying {} \
                     ({}, {})",
                    delta.user_id,
                    next.available,
                    next.reserved,
                    delta.reason,
                    delta.delta_available,
                    delta.delta_reserved,
                )));
            }

            staged.insert(delta.user_id.clone(), next);
        }

        Ok(staged)
    }

    /// Every balance row (recovery cross-checks).
    pub fn all_balances(&self) -> Vec<(String, Balance)> {
        self.inner
            .read()
            .balances
            .iter()
            .map(|(user, balance)| (user.clone(), balance.clone()))
            .collect()
    }

    /// Entries for one user, oldest first.
    pub fn entries_for(&self, user_id: &str) -> Vec<LedgerEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Replace the balance projection from persisted rows (startup recovery).
    pub fn load_balances(&self, rows: Vec<(String, Balance)>) {
        let mut inner = self.inner.write();
        for (user_id, balance) in rows {
            inner.balances.insert(user_id, balance);
        }
        inner
            .balances
            .entry(self.system_account.clone())
            .or_insert_with(Balance::default);
    }

    /// Continue entry ids after the highest persisted one.
    pub fn resume_entry_ids(&self, max_persisted_id: i64) {
        let mut inner = self.inner.write();
        if max_persisted_id >= inner.next_entry_id {
            inner.next_entry_id = max_persisted_id + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LedgerReason;
    use rust_decimal_macros::dec;

    fn ledger_with(user: &str, available: Decimal) -> Ledger {
        let ledger = Ledger::new("SYSTEM");
        ledger.open_account(user);
        ledger
            .apply(BalanceDelta::new(
                user,
                available,
                Decimal::ZERO,
                LedgerReason::FaucetCredit,
            ))
            .unwrap();
        ledger
    }

    #[test]
    fn test_apply_to_missing_account_fails() {
        let ledger = Ledger::new("SYSTEM");
        let result = ledger.apply(BalanceDelta::new(
            "nobody",
            dec!(10),
            Decimal::ZERO,
            LedgerReason::FaucetCredit,
        ));
        assert!(matches!(result, Err(TradeError::UnknownAccount(_))));
    }

    #[test]
    fn test_reserve_moves_between_components() {
        let ledger = ledger_with("alice", dec!(100));
        ledger
            .apply(BalanceDelta::new(
                "alice",
                dec!(-30),
                dec!(30),
                LedgerReason::OrderReserve,
            ))
            .unwrap();

        let balance = ledger.balance("alice");
        assert_eq!(balance.available, dec!(70));
        assert_eq!(balance.reserved, dec!(30));
        assert_eq!(balance.total(), dec!(100));
    }

    #[test]
    fn test_negative_balance_rejected_without_side_effects() {
        let ledger = ledger_with("alice", dec!(10));
        let before_entries = ledger.entry_count();

        let result = ledger.apply(BalanceDelta::new(
            "alice",
            dec!(-20),
            Decimal::ZERO,
            LedgerReason::TradeFee,
        ));

        assert!(matches!(result, Err(TradeError::Invariant(_))));
        assert_eq!(ledger.balance("alice").available, dec!(10));
        assert_eq!(ledger.entry_count(), before_entries);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let ledger = ledger_with("alice", dec!(100));
        ledger.open_account("bob");

        // Second delta would drive bob negative; the first must not land.
        let result = ledger.apply_batch(vec![
            BalanceDelta::new("alice", dec!(-50), Decimal::ZERO, LedgerReason::TradeBuy),
            BalanceDelta::new("bob", dec!(-1), Decimal::ZERO, LedgerReason::TradeFee),
        ]);

        assert!(result.is_err());
        assert_eq!(ledger.balance("alice").available, dec!(100));
        assert_eq!(ledger.balance("bob").available, Decimal::ZERO);
    }

    #[test]
    fn test_batch_sees_cumulative_effect_within_itself() {
        let ledger = ledger_with("alice", dec!(10));

        // 10 - 8 - 3 would be negative even though each delta alone is fine
        // against the starting balance.
        let result = ledger.apply_batch(vec![
            BalanceDelta::new("alice", dec!(-8), Decimal::ZERO, LedgerReason::TradeBuy),
            BalanceDelta::new("alice", dec!(-3), Decimal::ZERO, LedgerReason::TradeFee),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_system_account_may_go_negative() {
        let ledger = ledger_with("alice", dec!(100));
        // Resolution payout: SYSTEM funds the winner.
        ledger
            .apply_batch(vec![
                BalanceDelta::new("alice", dec!(100), Decimal::ZERO, LedgerReason::SettlementWin),
                BalanceDelta::new(
                    "SYSTEM",
                    dec!(-100),
                    Decimal::ZERO,
                    LedgerReason::SettlementWin,
                ),
            ])
            .unwrap();

        assert_eq!(ledger.balance("SYSTEM").available, dec!(-100));
        assert_eq!(ledger.balance("alice").available, dec!(200));
    }

    #[test]
    fn test_entries_are_appended_in_order() {
        let ledger = ledger_with("alice", dec!(100));
        ledger
            .apply(BalanceDelta::new(
                "alice",
                dec!(-30),
                dec!(30),
                LedgerReason::OrderReserve,
            ))
            .unwrap();

        let entries = ledger.entries_for("alice");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].id < entries[1].id);
        assert_eq!(entries[1].reason, LedgerReason::OrderReserve);
    }
}
