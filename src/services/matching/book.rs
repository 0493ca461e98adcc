//! Limit order book
//!
//! One book per (market, outcome). Bids and asks are price-indexed ordered
//! maps of FIFO queues, so price-time priority falls out of the structure:
//! best price is the edge key, time priority is queue order. An incoming
//! order is the taker and consumes resting makers head-first at the maker's
//! price.
//!
//! The book is plain single-threaded state. The trading coordinator owns it
//! behind a per-market lock; nothing here suspends, performs I/O, or reads a
//! clock, so identical call sequences produce identical matches.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, VecDeque};
use uuid::Uuid;

use crate::models::{Outcome, OrderSide};

use super::types::{AddOutcome, BookOrder, BookSnapshot, LevelSummary, Match, PriceLevel};

pub struct OrderBook {
    market_id: Uuid,
    outcome: Outcome,

    /// Best bid = highest key.
    bids: BTreeMap<PriceLevel, VecDeque<BookOrder>>,
    /// Best ask = lowest key.
    asks: BTreeMap<PriceLevel, VecDeque<BookOrder>>,

    /// Order id -> (side, level) for O(log n) cancellation.
    index: HashMap<Uuid, (OrderSide, PriceLevel)>,
}

impl OrderBook {
    pub fn new(market_id: Uuid, outcome: Outcome) -> Self {
        Self {
            market_id,
            outcome,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn market_id(&self) -> Uuid {
        self.market_id
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, order_id: &Uuid) -> bool {
        self.index.contains_key(order_id)
    }

    /// Submit an order: cross the opposite side while the price allows and
    /// quantity remains, then rest any residual on the order's own side.
    ///
    /// Callers guarantee `remaining > 0`; zero-quantity orders are rejected
    /// upstream.
    pub fn add_order(&mut self, mut order: BookOrder) -> AddOutcome {
        let matches = match order.side {
            OrderSide::Buy => self.cross_asks(&mut order),
            OrderSide::Sell => self.cross_bids(&mut order),
        };

        let remaining = order.remaining;
        if remaining > Decimal::ZERO {
            self.insert_resting(order);
        }

        AddOutcome { matches, remaining }
    }

    /// BUY taker: consume asks while `ask.price <= taker.price`.
    fn cross_asks(&mut self, taker: &mut BookOrder) -> Vec<Match> {
        let limit = PriceLevel::from_decimal(taker.price);
        let mut matches = Vec::new();
        let mut exhausted_levels = Vec::new();

        for (&level, queue) in self.asks.iter_mut() {
            if level > limit || taker.remaining.is_zero() {
                break;
            }
            Self::consume_level(queue, taker, &mut matches, &mut self.index);
            if queue.is_empty() {
                exhausted_levels.push(level);
            }
        }

        for level in exhausted_levels {
            self.asks.remove(&level);
        }
        matches
    }

    /// SELL taker: consume bids while `bid.price >= taker.price`.
    fn cross_bids(&mut self, taker: &mut BookOrder) -> Vec<Match> {
        let limit = PriceLevel::from_decimal(taker.price);
        let mut matches = Vec::new();
        let mut exhausted_levels = Vec::new();

        for (&level, queue) in self.bids.iter_mut().rev() {
            if level < limit || taker.remaining.is_zero() {
                break;
            }
            Self::consume_level(queue, taker, &mut matches, &mut self.index);
            if queue.is_empty() {
                exhausted_levels.push(level);
            }
        }

        for level in exhausted_levels {
            self.bids.remove(&level);
        }
        matches
    }

    /// Fill against one price level head-first.
    fn consume_level(
        queue: &mut VecDeque<BookOrder>,
        taker: &mut BookOrder,
        matches: &mut Vec<Match>,
        index: &mut HashMap<Uuid, (OrderSide, PriceLevel)>,
    ) {
        while taker.remaining > Decimal::ZERO {
            let Some(maker) = queue.front_mut() else {
                break;
            };

            let quantity = taker.remaining.min(maker.remaining);
            maker.remaining -= quantity;
            taker.remaining -= quantity;

            matches.push(Match {
                maker_order_id: maker.id,
                maker_user_id: maker.user_id.clone(),
                price: maker.price,
                quantity,
                maker_remaining: maker.remaining,
            });

            if maker.remaining.is_zero() {
                let maker_id = maker.id;
                queue.pop_front();
                index.remove(&maker_id);
            }
        }
    }

    /// Rest an order on its own side without matching (residuals, recovery).
    pub fn insert_resting(&mut self, order: BookOrder) {
        let level = PriceLevel::from_decimal(order.price);
        self.index.insert(order.id, (order.side, level));
        self.side_mut(order.side)
            .entry(level)
            .or_default()
            .push_back(order);
    }

    /// Remove an order from whichever side holds it.
    pub fn cancel(&mut self, order_id: Uuid) -> Option<BookOrder> {
        let (side, level) = self.index.remove(&order_id)?;
        let book = self.side_mut(side);
        let queue = book.get_mut(&level)?;
        let pos = queue.iter().position(|o| o.id == order_id)?;
        let order = queue.remove(pos);
        if queue.is_empty() {
            book.remove(&level);
        }
        order
    }

    /// Put a just-consumed maker back at the head of its level.
    ///
    /// Used by the coordinator's failure rewind: makers were consumed
    /// head-first, so reinstating them in reverse match order restores the
    /// original queue exactly.
    pub fn reinstate_front(&mut self, order: BookOrder) {
        let level = PriceLevel::from_decimal(order.price);
        self.index.insert(order.id, (order.side, level));
        self.side_mut(order.side)
            .entry(level)
            .or_default()
            .push_front(order);
    }

    /// Restore a partially consumed maker still at the head of its level.
    pub fn restore_remaining(&mut self, order_id: Uuid, remaining: Decimal) -> bool {
        let Some(&(side, level)) = self.index.get(&order_id) else {
            return false;
        };
        let book = match side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        };
        if let Some(queue) = book.get_mut(&level) {
            if let Some(order) = queue.iter_mut().find(|o| o.id == order_id) {
                order.remaining = remaining;
                return true;
            }
        }
        false
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().map(|l| l.to_decimal())
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().map(|l| l.to_decimal())
    }

    /// Midpoint of the touch. With one side empty, the best of the other
    /// side; with both empty, none. Halving a sum of two in-range decimals is
    /// exact.
    pub fn midpoint(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            (Some(bid), None) => Some(bid),
            (None, Some(ask)) => Some(ask),
            (None, None) => None,
        }
    }

    /// Aggregated levels, best-priced first on both sides.
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(depth)
            .map(|(level, queue)| Self::summarize(level, queue))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(depth)
            .map(|(level, queue)| Self::summarize(level, queue))
            .collect();

        BookSnapshot {
            bids,
            asks,
            best_bid: self.best_bid().map(|p| p.normalize()),
            best_ask: self.best_ask().map(|p| p.normalize()),
            midpoint: self.midpoint().map(|p| p.normalize()),
        }
    }

    fn summarize(level: &PriceLevel, queue: &VecDeque<BookOrder>) -> LevelSummary {
        LevelSummary {
            price: level.to_decimal().normalize(),
            quantity: queue.iter().map(|o| o.remaining).sum::<Decimal>().normalize(),
            order_count: queue.len(),
        }
    }

    /// Drain every resting order (market cancel / resolution).
    pub fn clear_all(&mut self) -> Vec<BookOrder> {
        let mut drained = Vec::with_capacity(self.index.len());
        for (_, mut queue) in std::mem::take(&mut self.bids) {
            drained.extend(queue.drain(..));
        }
        for (_, mut queue) in std::mem::take(&mut self.asks) {
            drained.extend(queue.drain(..));
        }
        self.index.clear();
        drained
    }

    fn side_mut(&mut self, side: OrderSide) -> &mut BTreeMap<PriceLevel, VecDeque<BookOrder>> {
        match side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        }
    }
}
