//! Trading coordinator
//!
//! The single writer for each market. An event (placement, cancel, market
//! cancel, resolution) runs start-to-finish under that market's lock:
//! validate, reserve, match, plan settlement, commit to the ledger and
//! position stores, then hand the committed rows to the write-behind
//! persistence worker. The in-memory commit is the serialization point;
//! business errors reject before anything mutates, and the narrow window
//! after book mutation is covered by an explicit rewind.

pub mod persist;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{
    Balance, LedgerEntry, LedgerReason, Market, MarketResolution, MarketStatus, Order, OrderSide,
    OrderStatus, Outcome, Position, Trade,
};
use crate::services::error::TradeError;
use crate::services::ledger::Ledger;
use crate::services::matching::{BookOrder, BookSnapshot, Match, OrderBook};
use crate::services::positions::{PositionDelta, PositionStore};
use crate::services::settlement::{self, SettlementPlan, TradeTerms};

use persist::{CommittedEvent, PersistRequest};

/// Trading knobs, sourced from `AppConfig`.
#[derive(Debug, Clone)]
pub struct TradingConfig {
    pub taker_fee_rate: Decimal,
    pub max_quantity: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub system_account_id: String,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            taker_fee_rate: Decimal::new(1, 2),      // 0.01
            max_quantity: Decimal::from(1_000_000),
            min_price: Decimal::new(1, 2),           // 0.01
            max_price: Decimal::new(99, 2),          // 0.99
            system_account_id: "SYSTEM".to_string(),
        }
    }
}

/// The two books of one market, guarded together as the per-market critical
/// section.
struct MarketBooks {
    yes: OrderBook,
    no: OrderBook,
}

impl MarketBooks {
    fn new(market_id: Uuid) -> Self {
        Self {
            yes: OrderBook::new(market_id, Outcome::Yes),
            no: OrderBook::new(market_id, Outcome::No),
        }
    }

    fn book_mut(&mut self, outcome: Outcome) -> &mut OrderBook {
        match outcome {
            Outcome::Yes => &mut self.yes,
            Outcome::No => &mut self.no,
        }
    }
}

/// Result of an order placement.
#[derive(Debug, Clone)]
pub struct PlaceOrderResult {
    pub order: Order,
    pub trades: Vec<Trade>,
}

/// A user's holdings view: balance, positions, open orders.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub user_id: String,
    pub balance: Balance,
    pub positions: Vec<Position>,
    pub open_orders: Vec<Order>,
}

/// Per-outcome top-of-book plus aggregated levels for one market.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MarketSnapshot {
    pub market_id: Uuid,
    pub yes: BookSnapshot,
    pub no: BookSnapshot,
}

pub struct TradingCoordinator {
    config: TradingConfig,
    ledger: Ledger,
    positions: PositionStore,

    markets: RwLock<HashMap<Uuid, Market>>,
    resolutions: RwLock<HashMap<Uuid, MarketResolution>>,

    /// Order records: the coordinator writes, readers take snapshots.
    orders: DashMap<Uuid, Order>,

    /// Per-market books behind the per-market lock.
    books: DashMap<Uuid, Arc<Mutex<MarketBooks>>>,

    /// Recent trades per market, newest last.
    trades: DashMap<Uuid, Vec<Trade>>,

    /// Arrival sequence for accepted orders.
    seq: AtomicI64,

    /// Write-behind persistence; absent in unit tests.
    persist: Option<mpsc::Sender<PersistRequest>>,
}

impl TradingCoordinator {
    pub fn new(config: TradingConfig) -> Self {
        let ledger = Ledger::new(config.system_account_id.clone());
        Self {
            config,
            ledger,
            positions: PositionStore::new(),
            markets: RwLock::new(HashMap::new()),
            resolutions: RwLock::new(HashMap::new()),
            orders: DashMap::new(),
            books: DashMap::new(),
            trades: DashMap::new(),
            seq: AtomicI64::new(1),
            persist: None,
        }
    }

    pub fn with_persistence(mut self, sender: mpsc::Sender<PersistRequest>) -> Self {
        self.persist = Some(sender);
        self
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Create the balance row for a user. Idempotent.
    pub fn open_account(&self, user_id: &str) {
        self.ledger.open_account(user_id);
    }

    /// Credit (or, for admin adjustments, debit) a user's available balance.
    pub fn credit(
        &self,
        user_id: &str,
        amount: Decimal,
        reason: LedgerReason,
    ) -> Result<LedgerEntry, TradeError> {
        self.ledger.open_account(user_id);
        let entry = self.ledger.apply(crate::models::BalanceDelta::new(
            user_id,
            amount,
            Decimal::ZERO,
            reason,
        ))?;
        self.persist_event(CommittedEvent {
            balances: vec![(user_id.to_string(), self.ledger.balance(user_id))],
            entries: vec![entry.clone()],
            ..CommittedEvent::default()
        });
        Ok(entry)
    }

    // ========================================================================
    // Markets
    // ========================================================================

    pub fn create_market(&self, question: String, description: Option<String>) -> Market {
        let market = Market::new(question, description, Utc::now());
        self.books
            .insert(market.id, Arc::new(Mutex::new(MarketBooks::new(market.id))));
        self.markets.write().insert(market.id, market.clone());
        info!(market = %market.id, "market created");

        self.persist_event(CommittedEvent {
            markets: vec![market.clone()],
            ..CommittedEvent::default()
        });
        market
    }

    pub fn market(&self, market_id: Uuid) -> Option<Market> {
        self.markets.read().get(&market_id).cloned()
    }

    pub fn list_markets(&self) -> Vec<Market> {
        let mut markets: Vec<Market> = self.markets.read().values().cloned().collect();
        markets.sort_by_key(|m| m.created_at);
        markets
    }

    pub fn resolution(&self, market_id: Uuid) -> Option<MarketResolution> {
        self.resolutions.read().get(&market_id).cloned()
    }

    fn open_market(&self, market_id: Uuid) -> Result<Market, TradeError> {
        let market = self
            .market(market_id)
            .ok_or(TradeError::MarketNotFound(market_id))?;
        if !market.status.is_tradable() {
            return Err(TradeError::MarketClosed(market_id));
        }
        Ok(market)
    }

    fn market_books(&self, market_id: Uuid) -> Result<Arc<Mutex<MarketBooks>>, TradeError> {
        self.books
            .get(&market_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(TradeError::MarketNotFound(market_id))
    }

    // ========================================================================
    // Order placement
    // ========================================================================

    pub fn place_order(
        &self,
        user_id: &str,
        market_id: Uuid,
        outcome: Outcome,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<PlaceOrderResult, TradeError> {
        self.validate_price(price)?;
        self.validate_quantity(quantity)?;
        self.open_market(market_id)?;
        if !self.ledger.has_account(user_id) {
            return Err(TradeError::UnknownAccount(user_id.to_string()));
        }

        let books = self.market_books(market_id)?;
        let mut books = books.lock();

        // Reservation first: a clean rejection point before the book moves.
        match side {
            OrderSide::Buy => {
                let needed = price * quantity;
                let available = self.ledger.balance(user_id).available;
                if available < needed {
                    return Err(TradeError::InsufficientFunds { needed, available });
                }
            }
            OrderSide::Sell => {
                let available = self.positions.available_shares(user_id, market_id, outcome);
                if available < quantity {
                    return Err(TradeError::InsufficientShares {
                        needed: quantity,
                        available,
                    });
                }
            }
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            market_id,
            outcome,
            side,
            price,
            quantity,
            remaining: quantity,
            status: OrderStatus::Open,
            created_at: now,
            seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
        };

        let mut entries = Vec::new();
        match side {
            OrderSide::Buy => {
                entries.push(
                    self.ledger
                        .apply(settlement::buy_reserve(user_id, order.id, price, quantity))?,
                );
            }
            OrderSide::Sell => {
                self.positions.apply_batch(&[PositionDelta::Reserve {
                    user_id: user_id.to_string(),
                    market_id,
                    outcome,
                    quantity,
                }])?;
            }
        }

        self.orders.insert(order.id, order.clone());

        let book = books.book_mut(outcome);
        let outcome_result = book.add_order(BookOrder {
            id: order.id,
            user_id: order.user_id.clone(),
            side,
            price,
            quantity,
            remaining: quantity,
            timestamp_ms: now.timestamp_millis(),
            seq: order.seq,
        });

        // Plan settlement for every match in one batch.
        let mut plan = SettlementPlan::new();
        let mut trades = Vec::with_capacity(outcome_result.matches.len());
        for m in &outcome_result.matches {
            let trade_id = Uuid::new_v4();
            plan.merge(settlement::trade(&TradeTerms {
                trade_id,
                market_id,
                outcome,
                taker_user_id: user_id,
                taker_order_id: order.id,
                taker_side: side,
                taker_limit_price: price,
                maker_user_id: &m.maker_user_id,
                maker_order_id: m.maker_order_id,
                price: m.price,
                quantity: m.quantity,
                taker_fee_rate: self.config.taker_fee_rate,
                system_account: &self.config.system_account_id,
            }));
            trades.push(Trade {
                id: trade_id,
                market_id,
                outcome,
                price: m.price,
                quantity: m.quantity,
                maker_order_id: m.maker_order_id,
                taker_order_id: order.id,
                maker_user_id: m.maker_user_id.clone(),
                taker_user_id: user_id.to_string(),
                taker_side: side,
                taker_fee: m.price * m.quantity * self.config.taker_fee_rate,
                created_at: now,
            });
        }

        match self.commit_plan(&plan) {
            Ok(written) => entries.extend(written),
            Err(e) => {
                // Undo the book mutation and the reservation, drop the record.
                self.rewind_placement(books.book_mut(outcome), &order, &outcome_result.matches);
                self.orders.remove(&order.id);
                let _ = match side {
                    OrderSide::Buy => self
                        .ledger
                        .apply_batch(
                            settlement::order_release(user_id, order.id, price, quantity)
                                .into_iter()
                                .collect(),
                        )
                        .map(|_| ()),
                    OrderSide::Sell => self.positions.apply_batch(&[PositionDelta::Release {
                        user_id: user_id.to_string(),
                        market_id,
                        outcome,
                        quantity,
                    }]),
                };
                error!(order = %order.id, error = %e, "settlement failed; placement rewound");
                return Err(e);
            }
        }

        // Commit succeeded: update order records and the trade log.
        let mut taker = order;
        taker.remaining = outcome_result.remaining;
        taker.status = taker.derived_status();
        self.orders.insert(taker.id, taker.clone());

        let mut touched_orders = vec![taker.clone()];
        for m in &outcome_result.matches {
            if let Some(mut maker) = self.orders.get_mut(&m.maker_order_id) {
                maker.remaining = m.maker_remaining;
                maker.status = maker.derived_status();
                touched_orders.push(maker.clone());
            }
        }
        if !trades.is_empty() {
            self.trades
                .entry(market_id)
                .or_default()
                .extend(trades.iter().cloned());
        }

        debug!(
            order = %taker.id,
            status = %taker.status,
            fills = trades.len(),
            remaining = %taker.remaining,
            "order placed"
        );

        self.persist_event(self.event_for(&plan, entries, touched_orders, trades.clone(), None, None));

        Ok(PlaceOrderResult { order: taker, trades })
    }

    fn validate_price(&self, price: Decimal) -> Result<(), TradeError> {
        if price < self.config.min_price || price > self.config.max_price {
            return Err(TradeError::InvalidPrice(format!(
                "price {} outside [{}, {}]",
                price, self.config.min_price, self.config.max_price
            )));
        }
        Ok(())
    }

    fn validate_quantity(&self, quantity: Decimal) -> Result<(), TradeError> {
        if quantity <= Decimal::ZERO {
            return Err(TradeError::InvalidQuantity(
                "quantity must be positive".to_string(),
            ));
        }
        if quantity > self.config.max_quantity {
            return Err(TradeError::InvalidQuantity(format!(
                "quantity {} exceeds cap {}",
                quantity, self.config.max_quantity
            )));
        }
        Ok(())
    }

    /// Apply a settlement plan: positions are checked first (stable under the
    /// market lock), then the ledger batch commits atomically, then the
    /// pre-validated position batch. Returns the written ledger entries.
    fn commit_plan(&self, plan: &SettlementPlan) -> Result<Vec<LedgerEntry>, TradeError> {
        self.positions.check_batch(&plan.positions)?;
        let entries = self.ledger.apply_batch(plan.ledger.clone())?;
        if let Err(e) = self.positions.apply_batch(&plan.positions) {
            // Unreachable after check_batch while the market lock is held.
            error!(error = %e, "position batch failed after validation");
            return Err(e);
        }
        Ok(entries)
    }

    /// Restore the book to its pre-event shape: drop the just-inserted
    /// residual, then reinstate consumed makers in reverse so head-of-queue
    /// priority comes back exactly.
    fn rewind_placement(&self, book: &mut OrderBook, taker: &Order, matches: &[Match]) {
        let _ = book.cancel(taker.id);
        for m in matches.iter().rev() {
            if m.maker_remaining > Decimal::ZERO {
                book.restore_remaining(m.maker_order_id, m.maker_remaining + m.quantity);
            } else if let Some(maker) = self.orders.get(&m.maker_order_id) {
                book.reinstate_front(BookOrder {
                    id: maker.id,
                    user_id: maker.user_id.clone(),
                    side: maker.side,
                    price: maker.price,
                    quantity: maker.quantity,
                    remaining: maker.remaining,
                    timestamp_ms: maker.created_at.timestamp_millis(),
                    seq: maker.seq,
                });
            }
        }
    }

    // ========================================================================
    // Order cancel
    // ========================================================================

    pub fn cancel_order(
        &self,
        user_id: &str,
        order_id: Uuid,
        is_admin: bool,
    ) -> Result<Order, TradeError> {
        let order = self
            .orders
            .get(&order_id)
            .map(|o| o.clone())
            .ok_or(TradeError::OrderNotFound(order_id))?;

        if !is_admin && order.user_id != user_id {
            return Err(TradeError::NotOwner);
        }
        if !order.is_cancellable() {
            return Err(TradeError::NotCancellable);
        }

        let books = self.market_books(order.market_id)?;
        let mut books = books.lock();

        // Re-read under the lock; a concurrent fill may have finished it.
        let order = self
            .orders
            .get(&order_id)
            .map(|o| o.clone())
            .ok_or(TradeError::OrderNotFound(order_id))?;
        if !order.is_cancellable() {
            return Err(TradeError::NotCancellable);
        }

        let book = books.book_mut(order.outcome);
        let removed = book.cancel(order_id).ok_or_else(|| {
            TradeError::Invariant(format!("active order {} missing from book", order_id))
        })?;

        let plan = settlement::order_cancel(&order);
        let entries = match self.commit_plan(&plan) {
            Ok(entries) => entries,
            Err(e) => {
                book.insert_resting(removed);
                return Err(e);
            }
        };

        let mut cancelled = order;
        cancelled.status = OrderStatus::Cancelled;
        self.orders.insert(order_id, cancelled.clone());
        info!(order = %order_id, "order cancelled");

        self.persist_event(self.event_for(&plan, entries, vec![cancelled.clone()], Vec::new(), None, None));
        Ok(cancelled)
    }

    // ========================================================================
    // Market lifecycle
    // ========================================================================

    /// Cancel a market: drain both books, refund every reservation, close the
    /// market. Cancelling an already-cancelled market is a no-op.
    pub fn cancel_market(&self, market_id: Uuid) -> Result<usize, TradeError> {
        let market = self
            .market(market_id)
            .ok_or(TradeError::MarketNotFound(market_id))?;
        match market.status {
            MarketStatus::Cancelled => return Ok(0),
            MarketStatus::Resolved => return Err(TradeError::MarketClosed(market_id)),
            MarketStatus::Open => {}
        }

        let books = self.market_books(market_id)?;
        let mut books = books.lock();

        let drained_records = self.drain_open_orders(&mut books);
        let plan = settlement::market_cancel(&drained_records);

        let entries = match self.commit_plan(&plan) {
            Ok(entries) => entries,
            Err(e) => {
                for record in &drained_records {
                    books.book_mut(record.outcome).insert_resting(Self::to_book_order(record));
                }
                return Err(e);
            }
        };

        let touched = self.mark_cancelled(&drained_records);

        let mut closed = market;
        closed.status = MarketStatus::Cancelled;
        closed.closed_at = Some(Utc::now());
        self.markets.write().insert(market_id, closed.clone());
        info!(market = %market_id, refunded = drained_records.len(), "market cancelled");

        self.persist_event(self.event_for(&plan, entries, touched, Vec::new(), Some(closed), None));
        Ok(drained_records.len())
    }

    /// Resolve a market: cancel open orders for their refunds, pay 1 per
    /// winning share from the system account, clear every position.
    pub fn resolve_market(
        &self,
        admin_user_id: &str,
        market_id: Uuid,
        winner: Outcome,
    ) -> Result<usize, TradeError> {
        let market = self
            .market(market_id)
            .ok_or(TradeError::MarketNotFound(market_id))?;
        if market.status != MarketStatus::Open {
            return Err(TradeError::MarketClosed(market_id));
        }

        let books = self.market_books(market_id)?;
        let mut books = books.lock();

        let drained_records = self.drain_open_orders(&mut books);
        let mut plan = settlement::market_cancel(&drained_records);

        let positions = self.positions.for_market(market_id);
        let settled = positions.iter().filter(|p| p.shares > Decimal::ZERO).count();
        plan.merge(settlement::resolution(
            market_id,
            winner,
            &positions,
            &self.config.system_account_id,
        ));

        let entries = match self.commit_plan(&plan) {
            Ok(entries) => entries,
            Err(e) => {
                for record in &drained_records {
                    books.book_mut(record.outcome).insert_resting(Self::to_book_order(record));
                }
                return Err(e);
            }
        };

        let touched = self.mark_cancelled(&drained_records);

        let resolution = MarketResolution {
            market_id,
            winning_outcome: winner,
            resolved_at: Utc::now(),
            resolver_user_id: admin_user_id.to_string(),
        };
        self.resolutions.write().insert(market_id, resolution.clone());

        let mut closed = market;
        closed.status = MarketStatus::Resolved;
        closed.closed_at = Some(resolution.resolved_at);
        self.markets.write().insert(market_id, closed.clone());
        info!(market = %market_id, winner = %winner, settled, "market resolved");

        self.persist_event(self.event_for(&plan, entries, touched, Vec::new(), Some(closed), Some(resolution)));
        Ok(settled)
    }

    /// Drain both books and return the order records behind the drained ids.
    fn drain_open_orders(&self, books: &mut MarketBooks) -> Vec<Order> {
        let mut drained = books.yes.clear_all();
        drained.extend(books.no.clear_all());

        drained
            .iter()
            .filter_map(|b| self.orders.get(&b.id).map(|o| o.clone()))
            .collect()
    }

    fn mark_cancelled(&self, records: &[Order]) -> Vec<Order> {
        let mut touched = Vec::with_capacity(records.len());
        for record in records {
            let mut cancelled = record.clone();
            cancelled.status = OrderStatus::Cancelled;
            self.orders.insert(cancelled.id, cancelled.clone());
            touched.push(cancelled);
        }
        touched
    }

    fn to_book_order(order: &Order) -> BookOrder {
        BookOrder {
            id: order.id,
            user_id: order.user_id.clone(),
            side: order.side,
            price: order.price,
            quantity: order.quantity,
            remaining: order.remaining,
            timestamp_ms: order.created_at.timestamp_millis(),
            seq: order.seq,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn order(&self, order_id: Uuid) -> Option<Order> {
        self.orders.get(&order_id).map(|o| o.clone())
    }

    pub fn snapshot(&self, market_id: Uuid, depth: usize) -> Result<MarketSnapshot, TradeError> {
        let books = self.market_books(market_id)?;
        let books = books.lock();
        Ok(MarketSnapshot {
            market_id,
            yes: books.yes.snapshot(depth),
            no: books.no.snapshot(depth),
        })
    }

    /// Best bid, best ask, midpoint for one outcome.
    pub fn best_prices(
        &self,
        market_id: Uuid,
        outcome: Outcome,
    ) -> Result<(Option<Decimal>, Option<Decimal>, Option<Decimal>), TradeError> {
        let books = self.market_books(market_id)?;
        let mut books = books.lock();
        let book = books.book_mut(outcome);
        Ok((book.best_bid(), book.best_ask(), book.midpoint()))
    }

    pub fn portfolio(&self, user_id: &str) -> Portfolio {
        let mut open_orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.user_id == user_id && o.status.is_active())
            .map(|o| o.clone())
            .collect();
        open_orders.sort_by_key(|o| o.seq);

        Portfolio {
            user_id: user_id.to_string(),
            balance: self.ledger.balance(user_id),
            positions: self.positions.for_user(user_id),
            open_orders,
        }
    }

    pub fn recent_trades(&self, market_id: Uuid, limit: usize) -> Vec<Trade> {
        self.trades
            .get(&market_id)
            .map(|trades| {
                trades
                    .iter()
                    .rev()
                    .take(limit)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
    }

    // ========================================================================
    // Persistence plumbing
    // ========================================================================

    /// Snapshot the rows an event touched into one persistence request.
    fn event_for(
        &self,
        plan: &SettlementPlan,
        entries: Vec<LedgerEntry>,
        orders: Vec<Order>,
        trades: Vec<Trade>,
        market: Option<Market>,
        resolution: Option<MarketResolution>,
    ) -> CommittedEvent {
        let mut users: Vec<String> = entries.iter().map(|e| e.user_id.clone()).collect();
        users.extend(orders.iter().map(|o| o.user_id.clone()));
        users.sort();
        users.dedup();

        let balances = users
            .iter()
            .map(|u| (u.clone(), self.ledger.balance(u)))
            .collect();

        let mut position_keys: Vec<(String, Uuid, Outcome)> = plan
            .positions
            .iter()
            .map(|d| match d {
                PositionDelta::Add { user_id, market_id, outcome, .. }
                | PositionDelta::Reserve { user_id, market_id, outcome, .. }
                | PositionDelta::Release { user_id, market_id, outcome, .. }
                | PositionDelta::ConsumeReserved { user_id, market_id, outcome, .. }
                | PositionDelta::Clear { user_id, market_id, outcome } => {
                    (user_id.clone(), *market_id, *outcome)
                }
            })
            .collect();
        // SELL placements reserve shares outside the plan; cover those rows.
        position_keys.extend(
            orders
                .iter()
                .filter(|o| o.side == OrderSide::Sell)
                .map(|o| (o.user_id.clone(), o.market_id, o.outcome)),
        );
        position_keys.sort();
        position_keys.dedup();

        let positions = position_keys
            .into_iter()
            .filter_map(|(user, market, outcome)| self.positions.get(&user, market, outcome))
            .collect();

        CommittedEvent {
            orders,
            trades,
            entries,
            balances,
            positions,
            markets: market.into_iter().collect(),
            resolutions: resolution.into_iter().collect(),
        }
    }

    fn persist_event(&self, event: CommittedEvent) {
        if let Some(sender) = &self.persist {
            if let Err(e) = sender.try_send(PersistRequest::Commit(Box::new(event))) {
                warn!(error = %e, "persistence queue rejected event");
            }
        }
    }

    // ========================================================================
    // Startup recovery
    // ========================================================================

    /// Rebuild in-memory state from persisted projections. Open orders are
    /// replayed into the books in ascending creation order, then the
    /// reservation projections are cross-checked against them.
    pub fn restore(
        &self,
        markets: Vec<Market>,
        resolutions: Vec<MarketResolution>,
        balances: Vec<(String, Balance)>,
        positions: Vec<Position>,
        open_orders: Vec<Order>,
        max_entry_id: i64,
    ) -> Result<usize, TradeError> {
        self.ledger.load_balances(balances);
        self.ledger.resume_entry_ids(max_entry_id);

        for position in positions {
            self.positions.load(position);
        }

        {
            let mut map = self.markets.write();
            for market in markets {
                self.books
                    .insert(market.id, Arc::new(Mutex::new(MarketBooks::new(market.id))));
                map.insert(market.id, market);
            }
        }
        {
            let mut map = self.resolutions.write();
            for resolution in resolutions {
                map.insert(resolution.market_id, resolution);
            }
        }

        let mut replayed = 0usize;
        let mut sorted = open_orders;
        sorted.sort_by_key(|o| (o.created_at, o.id));

        for mut order in sorted {
            if !order.status.is_active() || order.remaining <= Decimal::ZERO {
                warn!(order = %order.id, "skipping non-replayable order");
                continue;
            }
            let Ok(books) = self.market_books(order.market_id) else {
                warn!(order = %order.id, market = %order.market_id, "open order for unknown market");
                continue;
            };
            order.seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
            books
                .lock()
                .book_mut(order.outcome)
                .insert_resting(Self::to_book_order(&order));
            self.orders.insert(order.id, order);
            replayed += 1;
        }

        self.verify_reservations()?;
        info!(replayed, "book recovery complete");
        Ok(replayed)
    }

    /// Cross-check: every user's `reserved` equals the sum of their open BUY
    /// reservations, and each position's `reserved_shares` equals the sum of
    /// open SELL remainders on that outcome.
    fn verify_reservations(&self) -> Result<(), TradeError> {
        let mut cash: HashMap<String, Decimal> = HashMap::new();
        let mut shares: HashMap<(String, Uuid, Outcome), Decimal> = HashMap::new();

        for order in self.orders.iter() {
            if !order.status.is_active() {
                continue;
            }
            match order.side {
                OrderSide::Buy => {
                    *cash.entry(order.user_id.clone()).or_default() +=
                        order.price * order.remaining;
                }
                OrderSide::Sell => {
                    *shares
                        .entry((order.user_id.clone(), order.market_id, order.outcome))
                        .or_default() += order.remaining;
                }
            }
        }

        for (user, balance) in self.ledger.all_balances() {
            let expected = cash.get(&user).copied().unwrap_or(Decimal::ZERO);
            if balance.reserved != expected {
                return Err(TradeError::Invariant(format!(
                    "reserved balance for {} is {}, open orders imply {}",
                    user, balance.reserved, expected
                )));
            }
        }

        for position in self.positions.all() {
            let key = (position.user_id.clone(), position.market_id, position.outcome);
            let expected = shares.remove(&key).unwrap_or(Decimal::ZERO);
            if position.reserved_shares != expected {
                return Err(TradeError::Invariant(format!(
                    "reserved shares for {} on {:?} are {}, open orders imply {}",
                    position.user_id, position.outcome, position.reserved_shares, expected
                )));
            }
        }
        // Open SELL orders whose position row is missing entirely.
        if let Some(((user, _, outcome), expected)) = shares.into_iter().next() {
            return Err(TradeError::Invariant(format!(
                "open SELL orders for {} on {:?} imply {} reserved shares, but no position exists",
                user, outcome, expected
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
