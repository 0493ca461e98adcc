//! Settlement plan builders
//!
//! Pure functions turning a trade, order cancel, market cancel, or market
//! resolution into ledger and position deltas. Nothing here touches state;
//! the trading coordinator validates and commits the returned plans, which
//! gives every state transition a single audit point.
//!
//! Accounting convention: the taker pays the fee, the cash legs are gross,
//! and the system account mirrors every fee credit and funds resolution
//! payouts, so the deltas of each plan sum to exactly zero across all
//! parties including the system account.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{BalanceDelta, LedgerReason, Order, OrderSide, Outcome, Position, RefType};
use crate::services::positions::PositionDelta;

/// Deltas produced by one event. Committed atomically by the coordinator.
#[derive(Debug, Clone, Default)]
pub struct SettlementPlan {
    pub ledger: Vec<BalanceDelta>,
    pub positions: Vec<PositionDelta>,
}

impl SettlementPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty() && self.positions.is_empty()
    }

    pub fn merge(&mut self, other: SettlementPlan) {
        self.ledger.extend(other.ledger);
        self.positions.extend(other.positions);
    }

    /// Sum of `delta_available + delta_reserved` over every ledger delta.
    /// Zero for every plan this module builds.
    pub fn net_cash(&self) -> Decimal {
        self.ledger.iter().map(|d| d.net()).sum()
    }
}

/// Reserve collateral for a new BUY order: `price * quantity` moves from
/// available to reserved.
pub fn buy_reserve(user_id: &str, order_id: Uuid, price: Decimal, quantity: Decimal) -> BalanceDelta {
    let amount = price * quantity;
    BalanceDelta::new(user_id, -amount, amount, LedgerReason::OrderReserve)
        .with_ref(RefType::Order, order_id)
}

/// Return the reservation behind `remaining` unfilled BUY quantity.
pub fn order_release(
    user_id: &str,
    order_id: Uuid,
    price: Decimal,
    remaining: Decimal,
) -> Option<BalanceDelta> {
    let amount = price * remaining;
    if amount.is_zero() {
        return None;
    }
    Some(
        BalanceDelta::new(user_id, amount, -amount, LedgerReason::OrderReserveRelease)
            .with_ref(RefType::Order, order_id),
    )
}

/// Inputs for one executed match.
#[derive(Debug, Clone)]
pub struct TradeTerms<'a> {
    pub trade_id: Uuid,
    pub market_id: Uuid,
    pub outcome: Outcome,

    pub taker_user_id: &'a str,
    pub taker_order_id: Uuid,
    pub taker_side: OrderSide,
    /// The taker's limit price; reservations were made at this price.
    pub taker_limit_price: Decimal,

    pub maker_user_id: &'a str,
    pub maker_order_id: Uuid,

    /// Execution price: always the maker's limit.
    pub price: Decimal,
    pub quantity: Decimal,

    pub taker_fee_rate: Decimal,
    pub system_account: &'a str,
}

impl TradeTerms<'_> {
    pub fn value(&self) -> Decimal {
        self.price * self.quantity
    }

    pub fn fee(&self) -> Decimal {
        self.value() * self.taker_fee_rate
    }
}

/// Plan one trade.
///
/// BUY taker: the taker's reserved funds pay the gross value, the fee is an
/// extra debit from available, and the excess reservation from price
/// improvement (`limit > maker price`) is released. The maker delivers
/// reserved shares and receives the gross value.
///
/// SELL taker: mirror image. The maker's (buyer's) reservation pays the
/// gross value at its own limit (no improvement to release), the taker
/// delivers reserved shares, receives the gross value, and pays the fee.
pub fn trade(terms: &TradeTerms<'_>) -> SettlementPlan {
    let value = terms.value();
    let fee = terms.fee();
    let mut plan = SettlementPlan::new();

    let (buyer_user, buyer_order, seller_user, _seller_order) = match terms.taker_side {
        OrderSide::Buy => (
            terms.taker_user_id,
            terms.taker_order_id,
            terms.maker_user_id,
            terms.maker_order_id,
        ),
        OrderSide::Sell => (
            terms.maker_user_id,
            terms.maker_order_id,
            terms.taker_user_id,
            terms.taker_order_id,
        ),
    };

    // Buyer pays the gross value out of reserved funds.
    plan.ledger.push(
        BalanceDelta::new(buyer_user, Decimal::ZERO, -value, LedgerReason::TradeBuy)
            .with_ref(RefType::Trade, terms.trade_id),
    );

    // A BUY taker reserved at its own limit but executes at the maker's
    // price; hand the difference back so the open order holds exactly
    // `limit * remaining`.
    if terms.taker_side == OrderSide::Buy && terms.taker_limit_price > terms.price {
        let excess = (terms.taker_limit_price - terms.price) * terms.quantity;
        plan.ledger.push(
            BalanceDelta::new(buyer_user, excess, -excess, LedgerReason::OrderReserveRelease)
                .with_ref(RefType::Order, buyer_order),
        );
    }

    // Seller receives the gross value.
    plan.ledger.push(
        BalanceDelta::new(seller_user, value, Decimal::ZERO, LedgerReason::TradeSell)
            .with_ref(RefType::Trade, terms.trade_id),
    );

    // Taker pays the fee; the system account mirrors it.
    if fee > Decimal::ZERO {
        plan.ledger.push(
            BalanceDelta::new(terms.taker_user_id, -fee, Decimal::ZERO, LedgerReason::TradeFee)
                .with_ref(RefType::Trade, terms.trade_id),
        );
        plan.ledger.push(
            BalanceDelta::new(terms.system_account, fee, Decimal::ZERO, LedgerReason::TradeFee)
                .with_ref(RefType::Trade, terms.trade_id),
        );
    }

    // Shares move from the seller's reservation to the buyer at trade price.
    plan.positions.push(PositionDelta::Add {
        user_id: buyer_user.to_string(),
        market_id: terms.market_id,
        outcome: terms.outcome,
        quantity: terms.quantity,
        price: terms.price,
    });
    plan.positions.push(PositionDelta::ConsumeReserved {
        user_id: seller_user.to_string(),
        market_id: terms.market_id,
        outcome: terms.outcome,
        quantity: terms.quantity,
    });

    plan
}

/// Plan a user order cancel: return whatever the open remainder holds.
pub fn order_cancel(order: &Order) -> SettlementPlan {
    let mut plan = SettlementPlan::new();
    match order.side {
        OrderSide::Buy => {
            if let Some(delta) = order_release(&order.user_id, order.id, order.price, order.remaining)
            {
                plan.ledger.push(delta);
            }
        }
        OrderSide::Sell => {
            if order.remaining > Decimal::ZERO {
                plan.positions.push(PositionDelta::Release {
                    user_id: order.user_id.clone(),
                    market_id: order.market_id,
                    outcome: order.outcome,
                    quantity: order.remaining,
                });
            }
        }
    }
    plan
}

/// Plan a market cancel over every drained open order: refund each BUY
/// reservation, release SELL share reservations aggregated per
/// (user, outcome).
pub fn market_cancel(orders: &[Order]) -> SettlementPlan {
    use std::collections::BTreeMap;

    let mut plan = SettlementPlan::new();
    let mut share_releases: BTreeMap<(String, Outcome), Decimal> = BTreeMap::new();

    for order in orders {
        match order.side {
            OrderSide::Buy => {
                let amount = order.price * order.remaining;
                if amount > Decimal::ZERO {
                    plan.ledger.push(
                        BalanceDelta::new(
                            &order.user_id,
                            amount,
                            -amount,
                            LedgerReason::MarketCancelRefund,
                        )
                        .with_ref(RefType::Order, order.id),
                    );
                }
            }
            OrderSide::Sell => {
                if order.remaining > Decimal::ZERO {
                    *share_releases
                        .entry((order.user_id.clone(), order.outcome))
                        .or_default() += order.remaining;
                }
            }
        }
    }

    if let Some(market_id) = orders.first().map(|o| o.market_id) {
        for ((user_id, outcome), quantity) in share_releases {
            plan.positions.push(PositionDelta::Release {
                user_id,
                market_id,
                outcome,
                quantity,
            });
        }
    }

    plan
}

/// Plan a resolution: 1 unit per winning share, a zero-delta audit entry for
/// each losing position, funded by the system account; every position is
/// cleared. Open orders must have been cancelled first so no reservations
/// linger.
pub fn resolution(
    market_id: Uuid,
    winner: Outcome,
    positions: &[Position],
    system_account: &str,
) -> SettlementPlan {
    let mut plan = SettlementPlan::new();
    let mut total_payout = Decimal::ZERO;

    for position in positions {
        if position.shares.is_zero() {
            continue;
        }

        if position.outcome == winner {
            plan.ledger.push(
                BalanceDelta::new(
                    &position.user_id,
                    position.shares,
                    Decimal::ZERO,
                    LedgerReason::SettlementWin,
                )
                .with_ref(RefType::Market, market_id),
            );
            total_payout += position.shares;
        } else {
            plan.ledger.push(
                BalanceDelta::new(
                    &position.user_id,
                    Decimal::ZERO,
                    Decimal::ZERO,
                    LedgerReason::SettlementLoss,
                )
                .with_ref(RefType::Market, market_id),
            );
        }

        plan.positions.push(PositionDelta::Clear {
            user_id: position.user_id.clone(),
            market_id,
            outcome: position.outcome,
        });
    }

    if total_payout > Decimal::ZERO {
        plan.ledger.push(
            BalanceDelta::new(
                system_account,
                -total_payout,
                Decimal::ZERO,
                LedgerReason::SettlementWin,
            )
            .with_ref(RefType::Market, market_id),
        );
    }

    plan
}
