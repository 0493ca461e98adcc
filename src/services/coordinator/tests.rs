use super::*;
use rust_decimal_macros::dec;

fn coordinator() -> TradingCoordinator {
    TradingCoordinator::new(TradingConfig::default())
}

fn seed_cash(coord: &TradingCoordinator, user: &str, amount: Decimal) {
    coord.credit(user, amount, LedgerReason::FaucetCredit).unwrap();
}

fn seed_shares(coord: &TradingCoordinator, user: &str, market_id: Uuid, outcome: Outcome, shares: Decimal, avg: Decimal) {
    coord.open_account(user);
    let mut position = Position::new(user, market_id, outcome);
    position.shares = shares;
    position.avg_price = avg;
    coord.positions().load(position);
}

/// Total collateral across every account including SYSTEM.
fn total_cash(coord: &TradingCoordinator) -> Decimal {
    coord
        .ledger()
        .all_balances()
        .iter()
        .map(|(_, b)| b.total())
        .sum()
}

#[test]
fn s1_simple_cross_at_maker_price() {
    let coord = coordinator();
    let market = coord.create_market("Will it rain tomorrow?".into(), None);
    seed_cash(&coord, "alice", dec!(1000));
    seed_shares(&coord, "bob", market.id, Outcome::Yes, dec!(100), dec!(0.50));

    let sell = coord
        .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.55), dec!(50))
        .unwrap();
    assert_eq!(sell.order.status, OrderStatus::Open);
    assert!(sell.trades.is_empty());

    let buy = coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.60), dec!(50))
        .unwrap();

    assert_eq!(buy.order.status, OrderStatus::Filled);
    assert_eq!(buy.trades.len(), 1);
    let trade = &buy.trades[0];
    assert_eq!(trade.price, dec!(0.55));
    assert_eq!(trade.quantity, dec!(50));
    assert_eq!(trade.value(), dec!(27.50));
    assert_eq!(trade.taker_fee, dec!(0.275));

    // Taker: gross value from reserved funds, fee from available, price
    // improvement released.
    let alice = coord.ledger().balance("alice");
    assert_eq!(alice.available, dec!(972.225));
    assert_eq!(alice.reserved, Decimal::ZERO);
    let alice_pos = coord.positions().get("alice", market.id, Outcome::Yes).unwrap();
    assert_eq!(alice_pos.shares, dec!(50));
    assert_eq!(alice_pos.avg_price, dec!(0.55));

    // Maker receives the gross value; the taker alone paid the fee.
    let bob = coord.ledger().balance("bob");
    assert_eq!(bob.available, dec!(27.50));
    let bob_pos = coord.positions().get("bob", market.id, Outcome::Yes).unwrap();
    assert_eq!(bob_pos.shares, dec!(50));
    assert_eq!(bob_pos.reserved_shares, Decimal::ZERO);

    let system = coord.ledger().balance(coord.config().system_account_id.as_str());
    assert_eq!(system.available, dec!(0.275));

    // The event conserved collateral.
    assert_eq!(total_cash(&coord), dec!(1000));
}

#[test]
fn s2_partial_fill_with_residual() {
    let coord = coordinator();
    let market = coord.create_market("Partial fill".into(), None);
    seed_cash(&coord, "alice", dec!(1000));
    seed_shares(&coord, "bob", market.id, Outcome::Yes, dec!(40), dec!(0.50));

    let buy = coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.60), dec!(100))
        .unwrap();
    assert_eq!(buy.order.status, OrderStatus::Open);

    let sell = coord
        .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.55), dec!(40))
        .unwrap();

    // One fill at the maker's resting price.
    assert_eq!(sell.trades.len(), 1);
    assert_eq!(sell.trades[0].quantity, dec!(40));
    assert_eq!(sell.trades[0].price, dec!(0.60));
    assert_eq!(sell.order.status, OrderStatus::Filled);

    let resting = coord.order(buy.order.id).unwrap();
    assert_eq!(resting.status, OrderStatus::Partial);
    assert_eq!(resting.remaining, dec!(60));

    // Residual still holds exactly limit * remaining.
    let alice = coord.ledger().balance("alice");
    assert_eq!(alice.reserved, dec!(36.00));

    let snapshot = coord.snapshot(market.id, 10).unwrap();
    assert_eq!(snapshot.yes.best_bid, Some(dec!(0.6)));
    assert_eq!(snapshot.yes.bids[0].quantity, dec!(60));
}

#[test]
fn s3_multi_level_sweep() {
    let coord = coordinator();
    let market = coord.create_market("Sweep".into(), None);
    seed_cash(&coord, "taker", dec!(1000));
    for seller in ["s1", "s2", "s3"] {
        seed_shares(&coord, seller, market.id, Outcome::Yes, dec!(100), dec!(0.50));
    }

    coord
        .place_order("s1", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.50), dec!(30))
        .unwrap();
    coord
        .place_order("s2", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.50), dec!(30))
        .unwrap();
    let s3 = coord
        .place_order("s3", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.60), dec!(50))
        .unwrap();

    let buy = coord
        .place_order("taker", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.60), dec!(100))
        .unwrap();

    assert_eq!(buy.trades.len(), 3);
    assert_eq!(buy.trades[0].maker_user_id, "s1");
    assert_eq!(buy.trades[0].price, dec!(0.50));
    assert_eq!(buy.trades[0].quantity, dec!(30));
    assert_eq!(buy.trades[1].maker_user_id, "s2");
    assert_eq!(buy.trades[1].quantity, dec!(30));
    assert_eq!(buy.trades[2].maker_user_id, "s3");
    assert_eq!(buy.trades[2].price, dec!(0.60));
    assert_eq!(buy.trades[2].quantity, dec!(40));
    assert_eq!(buy.order.status, OrderStatus::Filled);

    let s3_order = coord.order(s3.order.id).unwrap();
    assert_eq!(s3_order.status, OrderStatus::Partial);
    assert_eq!(s3_order.remaining, dec!(10));

    assert_eq!(total_cash(&coord), dec!(1000));
}

#[test]
fn s4_resolution_payout() {
    let coord = coordinator();
    let market = coord.create_market("Resolution".into(), None);
    seed_shares(&coord, "alice", market.id, Outcome::Yes, dec!(100), dec!(0.40));
    seed_shares(&coord, "bob", market.id, Outcome::No, dec!(50), dec!(0.60));

    let settled = coord.resolve_market("admin", market.id, Outcome::Yes).unwrap();
    assert_eq!(settled, 2);

    assert_eq!(coord.ledger().balance("alice").available, dec!(100));
    assert_eq!(coord.ledger().balance("bob").available, Decimal::ZERO);

    let alice_entries = coord.ledger().entries_for("alice");
    assert!(alice_entries
        .iter()
        .any(|e| e.reason == LedgerReason::SettlementWin && e.delta_available == dec!(100)));
    let bob_entries = coord.ledger().entries_for("bob");
    assert!(bob_entries
        .iter()
        .any(|e| e.reason == LedgerReason::SettlementLoss && e.delta_available.is_zero()));

    // Positions cleared, rows kept for audit.
    assert_eq!(
        coord.positions().get("alice", market.id, Outcome::Yes).unwrap().shares,
        Decimal::ZERO
    );
    assert_eq!(
        coord.positions().get("bob", market.id, Outcome::No).unwrap().shares,
        Decimal::ZERO
    );

    let market = coord.market(market.id).unwrap();
    assert_eq!(market.status, MarketStatus::Resolved);
    let resolution = coord.resolution(market.id).unwrap();
    assert_eq!(resolution.winning_outcome, Outcome::Yes);
    assert_eq!(resolution.resolver_user_id, "admin");
}

#[test]
fn s5_cancel_returns_reservation_exactly() {
    let coord = coordinator();
    let market = coord.create_market("Cancel".into(), None);
    seed_cash(&coord, "alice", dec!(500));

    let placed = coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.30), dec!(100))
        .unwrap();
    let mid = coord.ledger().balance("alice");
    assert_eq!(mid.available, dec!(470));
    assert_eq!(mid.reserved, dec!(30));

    let cancelled = coord.cancel_order("alice", placed.order.id, false).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let after = coord.ledger().balance("alice");
    assert_eq!(after.available, dec!(500));
    assert_eq!(after.reserved, Decimal::ZERO);
    assert!(coord.recent_trades(market.id, 10).is_empty());
}

#[test]
fn s6_market_cancel_refunds_both_sides() {
    let coord = coordinator();
    let market = coord.create_market("Market cancel".into(), None);
    seed_cash(&coord, "alice", dec!(100));
    seed_shares(&coord, "bob", market.id, Outcome::Yes, dec!(40), dec!(0.50));

    let alice_buy = coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.30), dec!(100))
        .unwrap();
    let bob_sell = coord
        .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.70), dec!(40))
        .unwrap();
    assert_eq!(
        coord.positions().get("bob", market.id, Outcome::Yes).unwrap().reserved_shares,
        dec!(40)
    );

    let refunded = coord.cancel_market(market.id).unwrap();
    assert_eq!(refunded, 2);

    let alice = coord.ledger().balance("alice");
    assert_eq!(alice.available, dec!(100));
    assert_eq!(alice.reserved, Decimal::ZERO);

    let bob_pos = coord.positions().get("bob", market.id, Outcome::Yes).unwrap();
    assert_eq!(bob_pos.shares, dec!(40));
    assert_eq!(bob_pos.reserved_shares, Decimal::ZERO);

    assert_eq!(coord.order(alice_buy.order.id).unwrap().status, OrderStatus::Cancelled);
    assert_eq!(coord.order(bob_sell.order.id).unwrap().status, OrderStatus::Cancelled);
    assert_eq!(coord.market(market.id).unwrap().status, MarketStatus::Cancelled);
}

#[test]
fn cancel_market_is_idempotent() {
    let coord = coordinator();
    let market = coord.create_market("Idempotent".into(), None);
    assert_eq!(coord.cancel_market(market.id).unwrap(), 0);
    assert_eq!(coord.cancel_market(market.id).unwrap(), 0);
}

#[test]
fn resolve_twice_fails_without_ledger_change() {
    let coord = coordinator();
    let market = coord.create_market("Resolve twice".into(), None);
    seed_shares(&coord, "alice", market.id, Outcome::Yes, dec!(10), dec!(0.50));

    coord.resolve_market("admin", market.id, Outcome::Yes).unwrap();
    let entries_before = coord.ledger().entry_count();

    let result = coord.resolve_market("admin", market.id, Outcome::No);
    assert!(matches!(result, Err(TradeError::MarketClosed(_))));
    assert_eq!(coord.ledger().entry_count(), entries_before);
    assert_eq!(coord.resolution(market.id).unwrap().winning_outcome, Outcome::Yes);
}

#[test]
fn cancel_cancelled_order_returns_not_cancellable() {
    let coord = coordinator();
    let market = coord.create_market("Recancel".into(), None);
    seed_cash(&coord, "alice", dec!(100));

    let placed = coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.30), dec!(10))
        .unwrap();
    coord.cancel_order("alice", placed.order.id, false).unwrap();

    let result = coord.cancel_order("alice", placed.order.id, false);
    assert!(matches!(result, Err(TradeError::NotCancellable)));
}

#[test]
fn cancel_requires_ownership_unless_admin() {
    let coord = coordinator();
    let market = coord.create_market("Ownership".into(), None);
    seed_cash(&coord, "alice", dec!(100));

    let placed = coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.30), dec!(10))
        .unwrap();

    let result = coord.cancel_order("mallory", placed.order.id, false);
    assert!(matches!(result, Err(TradeError::NotOwner)));

    let cancelled = coord.cancel_order("ops", placed.order.id, true).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}

#[test]
fn closed_market_rejects_orders() {
    let coord = coordinator();
    let market = coord.create_market("Closed".into(), None);
    seed_cash(&coord, "alice", dec!(100));
    coord.cancel_market(market.id).unwrap();

    let result = coord.place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.30), dec!(10));
    assert!(matches!(result, Err(TradeError::MarketClosed(_))));
}

#[test]
fn rejections_leave_no_side_effects() {
    let coord = coordinator();
    let market = coord.create_market("Rejections".into(), None);
    seed_cash(&coord, "alice", dec!(10));
    let entries_before = coord.ledger().entry_count();

    // Insufficient funds: needs 30, has 10.
    let result = coord.place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.30), dec!(100));
    assert!(matches!(result, Err(TradeError::InsufficientFunds { .. })));

    // Insufficient shares.
    let result = coord.place_order("alice", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.50), dec!(5));
    assert!(matches!(result, Err(TradeError::InsufficientShares { .. })));

    // Out-of-range price and zero quantity.
    let result = coord.place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(1.50), dec!(10));
    assert!(matches!(result, Err(TradeError::InvalidPrice(_))));
    let result = coord.place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.30), Decimal::ZERO);
    assert!(matches!(result, Err(TradeError::InvalidQuantity(_))));

    // Unknown user.
    let result = coord.place_order("ghost", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.30), dec!(10));
    assert!(matches!(result, Err(TradeError::UnknownAccount(_))));

    assert_eq!(coord.ledger().entry_count(), entries_before);
    assert_eq!(coord.snapshot(market.id, 10).unwrap().yes.bids.len(), 0);
    assert!(coord.portfolio("alice").open_orders.is_empty());
}

#[test]
fn quantity_cap_enforced() {
    let coord = coordinator();
    let market = coord.create_market("Cap".into(), None);
    seed_cash(&coord, "alice", dec!(10_000_000));

    let result = coord.place_order(
        "alice",
        market.id,
        Outcome::Yes,
        OrderSide::Buy,
        dec!(0.50),
        dec!(1_000_001),
    );
    assert!(matches!(result, Err(TradeError::InvalidQuantity(_))));
}

#[test]
fn self_trade_settles_like_any_other() {
    let coord = coordinator();
    let market = coord.create_market("Self trade".into(), None);
    seed_cash(&coord, "alice", dec!(100));
    seed_shares(&coord, "alice", market.id, Outcome::Yes, dec!(50), dec!(0.50));

    coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.55), dec!(50))
        .unwrap();
    let buy = coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.55), dec!(50))
        .unwrap();

    assert_eq!(buy.trades.len(), 1);

    // Shares round-trip; only the fee leaves the account.
    let pos = coord.positions().get("alice", market.id, Outcome::Yes).unwrap();
    assert_eq!(pos.shares, dec!(50));
    assert_eq!(pos.reserved_shares, Decimal::ZERO);

    let fee = dec!(27.50) * dec!(0.01);
    let balance = coord.ledger().balance("alice");
    assert_eq!(balance.available, dec!(100) - fee);
    assert_eq!(balance.reserved, Decimal::ZERO);
}

#[test]
fn outcomes_have_independent_books() {
    let coord = coordinator();
    let market = coord.create_market("Two books".into(), None);
    seed_cash(&coord, "alice", dec!(100));
    seed_cash(&coord, "bob", dec!(100));

    coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.60), dec!(10))
        .unwrap();
    // A NO bid at a crossing-looking price must not touch the YES book.
    let no_buy = coord
        .place_order("bob", market.id, Outcome::No, OrderSide::Buy, dec!(0.60), dec!(10))
        .unwrap();
    assert!(no_buy.trades.is_empty());

    let snapshot = coord.snapshot(market.id, 10).unwrap();
    assert_eq!(snapshot.yes.bids.len(), 1);
    assert_eq!(snapshot.no.bids.len(), 1);
    assert!(snapshot.yes.asks.is_empty());
}

#[test]
fn best_prices_and_midpoint() {
    let coord = coordinator();
    let market = coord.create_market("Ticker".into(), None);
    seed_cash(&coord, "alice", dec!(100));
    seed_shares(&coord, "bob", market.id, Outcome::Yes, dec!(100), dec!(0.50));

    coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.55), dec!(10))
        .unwrap();
    coord
        .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.60), dec!(10))
        .unwrap();

    let (bid, ask, mid) = coord.best_prices(market.id, Outcome::Yes).unwrap();
    assert_eq!(bid, Some(dec!(0.55)));
    assert_eq!(ask, Some(dec!(0.60)));
    assert_eq!(mid, Some(dec!(0.575)));
}

#[test]
fn portfolio_reflects_balance_positions_and_open_orders() {
    let coord = coordinator();
    let market = coord.create_market("Portfolio".into(), None);
    seed_cash(&coord, "alice", dec!(1000));
    seed_shares(&coord, "alice", market.id, Outcome::No, dec!(25), dec!(0.45));

    coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.40), dec!(50))
        .unwrap();

    let portfolio = coord.portfolio("alice");
    assert_eq!(portfolio.balance.available, dec!(980));
    assert_eq!(portfolio.balance.reserved, dec!(20));
    assert_eq!(portfolio.positions.len(), 1);
    assert_eq!(portfolio.positions[0].shares, dec!(25));
    assert_eq!(portfolio.open_orders.len(), 1);
    assert_eq!(portfolio.open_orders[0].remaining, dec!(50));
}

#[test]
fn trade_log_returns_newest_first() {
    let coord = coordinator();
    let market = coord.create_market("Trades".into(), None);
    seed_cash(&coord, "alice", dec!(1000));
    seed_shares(&coord, "bob", market.id, Outcome::Yes, dec!(100), dec!(0.50));

    coord
        .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.50), dec!(10))
        .unwrap();
    coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.50), dec!(10))
        .unwrap();
    coord
        .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.52), dec!(10))
        .unwrap();
    coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.52), dec!(10))
        .unwrap();

    let trades = coord.recent_trades(market.id, 10);
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].price, dec!(0.52));
    assert_eq!(trades[1].price, dec!(0.50));

    assert_eq!(coord.recent_trades(market.id, 1).len(), 1);
}

#[test]
fn reservation_tracks_open_buy_orders_exactly() {
    // Invariant 3: reserved equals the sum of limit * remaining across open
    // BUY orders, at every step.
    let coord = coordinator();
    let market = coord.create_market("Reservation tracking".into(), None);
    seed_cash(&coord, "alice", dec!(1000));
    seed_shares(&coord, "bob", market.id, Outcome::Yes, dec!(100), dec!(0.50));

    let b1 = coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.60), dec!(100))
        .unwrap();
    coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.40), dec!(50))
        .unwrap();
    assert_eq!(coord.ledger().balance("alice").reserved, dec!(80));

    // Partial fill of the 0.60 order at 0.55: reservation follows remaining.
    coord
        .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.55), dec!(30))
        .unwrap();
    let b1_after = coord.order(b1.order.id).unwrap();
    assert_eq!(b1_after.remaining, dec!(70));
    assert_eq!(
        coord.ledger().balance("alice").reserved,
        dec!(0.60) * dec!(70) + dec!(0.40) * dec!(50)
    );
}

#[test]
fn recovery_rebuilds_books_and_passes_cross_check() {
    let source = coordinator();
    let market = source.create_market("Recovery".into(), None);
    seed_cash(&source, "alice", dec!(1000));
    seed_shares(&source, "bob", market.id, Outcome::Yes, dec!(100), dec!(0.50));

    source
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.55), dec!(40))
        .unwrap();
    source
        .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.65), dec!(30))
        .unwrap();

    // Simulate a restart from the persisted projections.
    let open_orders: Vec<Order> = ["alice", "bob"]
        .iter()
        .flat_map(|u| source.portfolio(u).open_orders)
        .collect();
    let restored = coordinator();
    let replayed = restored
        .restore(
            source.list_markets(),
            Vec::new(),
            source.ledger().all_balances(),
            source.positions().for_market(market.id),
            open_orders,
            source.ledger().entry_count() as i64,
        )
        .unwrap();
    assert_eq!(replayed, 2);

    let snapshot = restored.snapshot(market.id, 10).unwrap();
    assert_eq!(snapshot.yes.best_bid, Some(dec!(0.55)));
    assert_eq!(snapshot.yes.best_ask, Some(dec!(0.65)));

    // Replayed orders keep matching normally.
    let fill = restored
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.65), dec!(30))
        .unwrap();
    assert_eq!(fill.trades.len(), 1);
    assert_eq!(fill.trades[0].price, dec!(0.65));
}

#[test]
fn recovery_rejects_mismatched_reservations() {
    let source = coordinator();
    let market = source.create_market("Bad recovery".into(), None);
    seed_cash(&source, "alice", dec!(1000));
    source
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.55), dec!(40))
        .unwrap();

    // Corrupt the balance projection: reserved no longer matches the order.
    let balances = vec![(
        "alice".to_string(),
        Balance {
            available: dec!(978),
            reserved: dec!(10),
        },
    )];

    let restored = coordinator();
    let result = restored.restore(
        source.list_markets(),
        Vec::new(),
        balances,
        Vec::new(),
        source.portfolio("alice").open_orders,
        0,
    );
    assert!(matches!(result, Err(TradeError::Invariant(_))));
}

#[test]
fn determinism_same_sequence_same_state() {
    let run = || {
        let coord = coordinator();
        let market = coord.create_market("Determinism".into(), None);
        seed_cash(&coord, "alice", dec!(1000));
        seed_shares(&coord, "bob", market.id, Outcome::Yes, dec!(200), dec!(0.50));

        coord
            .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.50), dec!(60))
            .unwrap();
        coord
            .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.52), dec!(40))
            .unwrap();
        let result = coord
            .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.52), dec!(80))
            .unwrap();

        let fills: Vec<(Decimal, Decimal)> =
            result.trades.iter().map(|t| (t.price, t.quantity)).collect();
        (fills, coord.ledger().balance("alice"), coord.ledger().balance("bob"))
    };

    let (fills_a, alice_a, bob_a) = run();
    let (fills_b, alice_b, bob_b) = run();
    assert_eq!(fills_a, fills_b);
    assert_eq!(alice_a.available, alice_b.available);
    assert_eq!(bob_a.available, bob_b.available);
}

#[test]
fn every_event_conserves_collateral() {
    let coord = coordinator();
    let market = coord.create_market("Conservation".into(), None);
    seed_cash(&coord, "alice", dec!(500));
    seed_cash(&coord, "bob", dec!(500));
    seed_shares(&coord, "bob", market.id, Outcome::Yes, dec!(100), dec!(0.50));
    let seeded = dec!(1000);

    coord
        .place_order("bob", market.id, Outcome::Yes, OrderSide::Sell, dec!(0.45), dec!(60))
        .unwrap();
    assert_eq!(total_cash(&coord), seeded);

    coord
        .place_order("alice", market.id, Outcome::Yes, OrderSide::Buy, dec!(0.50), dec!(80))
        .unwrap();
    assert_eq!(total_cash(&coord), seeded);

    coord.resolve_market("admin", market.id, Outcome::Yes).unwrap();
    assert_eq!(total_cash(&coord), seeded);
}
