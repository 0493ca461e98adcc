//! Balance and ledger-entry models
//!
//! Balances split into `available` (freely spendable) and `reserved`
//! (earmarked against open BUY orders). Every change is recorded as an
//! append-only ledger entry carrying the signed deltas and a reason.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Per-user collateral balance. Both components are always non-negative.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct Balance {
    pub available: Decimal,
    pub reserved: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.available + self.reserved
    }
}

/// Why a ledger entry was written. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ledger_reason", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerReason {
    FaucetCredit,
    OrderReserve,
    OrderReserveRelease,
    TradeBuy,
    TradeSell,
    TradeFee,
    SettlementWin,
    SettlementLoss,
    MarketCancelRefund,
    AdminAdjustment,
}

impl fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LedgerReason::FaucetCredit => "FAUCET_CREDIT",
            LedgerReason::OrderReserve => "ORDER_RESERVE",
            LedgerReason::OrderReserveRelease => "ORDER_RESERVE_RELEASE",
            LedgerReason::TradeBuy => "TRADE_BUY",
            LedgerReason::TradeSell => "TRADE_SELL",
            LedgerReason::TradeFee => "TRADE_FEE",
            LedgerReason::SettlementWin => "SETTLEMENT_WIN",
            LedgerReason::SettlementLoss => "SETTLEMENT_LOSS",
            LedgerReason::MarketCancelRefund => "MARKET_CANCEL_REFUND",
            LedgerReason::AdminAdjustment => "ADMIN_ADJUSTMENT",
        };
        write!(f, "{}", s)
    }
}

/// What a ledger entry points back at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ledger_ref_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    Order,
    Trade,
    Market,
}

/// A signed balance change to apply to one user.
///
/// The unit of input to the ledger: settlement plans are lists of these.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceDelta {
    pub user_id: String,
    pub delta_available: Decimal,
    pub delta_reserved: Decimal,
    pub reason: LedgerReason,
    pub ref_type: Option<RefType>,
    pub ref_id: Option<Uuid>,
}

impl BalanceDelta {
    pub fn new(
        user_id: impl Into<String>,
        delta_available: Decimal,
        delta_reserved: Decimal,
        reason: LedgerReason,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            delta_available,
            delta_reserved,
            reason,
            ref_type: None,
            ref_id: None,
        }
    }

    pub fn with_ref(mut self, ref_type: RefType, ref_id: Uuid) -> Self {
        self.ref_type = Some(ref_type);
        self.ref_id = Some(ref_id);
        self
    }

    /// Net movement across both components.
    pub fn net(&self) -> Decimal {
        self.delta_available + self.delta_reserved
    }
}

/// Immutable, append-only ledger record. Never updated or deleted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: String,
    pub delta_available: Decimal,
    pub delta_reserved: Decimal,
    pub reason: LedgerReason,
    pub ref_type: Option<RefType>,
    pub ref_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_total() {
        let balance = Balance {
            available: dec!(70),
            reserved: dec!(30),
        };
        assert_eq!(balance.total(), dec!(100));
    }

    #[test]
    fn test_delta_net() {
        // A reservation moves value between components; net is zero.
        let delta = BalanceDelta::new("alice", dec!(-30), dec!(30), LedgerReason::OrderReserve);
        assert_eq!(delta.net(), Decimal::ZERO);

        let fee = BalanceDelta::new("alice", dec!(-0.275), Decimal::ZERO, LedgerReason::TradeFee);
        assert_eq!(fee.net(), dec!(-0.275));
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(LedgerReason::OrderReserveRelease.to_string(), "ORDER_RESERVE_RELEASE");
        assert_eq!(LedgerReason::TradeFee.to_string(), "TRADE_FEE");
    }
}
