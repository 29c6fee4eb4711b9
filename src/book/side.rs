//! One side (bid or ask) of an instrument's order book.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use crate::model::{Order, Price, Side};

use super::price_level::PriceLevel;

/// A price ladder for one side of the book.
///
/// Levels are always keyed ascending in the underlying `SkipMap`; which
/// direction is "best" depends on which side this is — ascending for asks
/// (lowest offer wins), descending for bids (highest bid wins). Within a
/// level, resting orders are FIFO by arrival, giving price-time priority
/// without any extra comparison key.
pub struct OrderBookSide {
    side: Side,
    levels: SkipMap<Price, Arc<PriceLevel>>,
    open_volume: AtomicU64,
}

impl OrderBookSide {
    pub fn new(side: Side) -> Self {
        OrderBookSide {
            side,
            levels: SkipMap::new(),
            open_volume: AtomicU64::new(0),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn open_volume(&self) -> u64 {
        self.open_volume.load(Ordering::Relaxed)
    }

    /// The best (highest bid / lowest ask) price currently resting, if any.
    pub fn best_price(&self) -> Option<Price> {
        match self.side {
            Side::Buy => self.levels.back().map(|e| *e.key()),
            Side::Sell => self.levels.front().map(|e| *e.key()),
        }
    }

    /// The price at `depth` levels from the best (0 = best itself).
    pub fn price_at_depth(&self, depth: usize) -> Option<Price> {
        match self.side {
            Side::Buy => self.levels.iter().rev().nth(depth).map(|e| *e.key()),
            Side::Sell => self.levels.iter().nth(depth).map(|e| *e.key()),
        }
    }

    /// Total open quantity resting at exactly `price`.
    pub fn volume_at_price(&self, price: Price) -> u64 {
        self.levels
            .get(&price)
            .map(|e| e.value().total_open_quantity())
            .unwrap_or(0)
    }

    /// Levels in best-first order, for matching and for depth snapshots.
    pub fn levels_best_first(&self) -> Box<dyn Iterator<Item = Arc<PriceLevel>> + '_> {
        match self.side {
            Side::Buy => Box::new(self.levels.iter().rev().map(|e| e.value().clone())),
            Side::Sell => Box::new(self.levels.iter().map(|e| e.value().clone())),
        }
    }

    /// Inserts a resting order, creating its price level if necessary.
    /// Sets the order's status to `New` unless it already has fills (in
    /// which case it keeps `PartiallyFilled`), and bumps this side's open
    /// volume.
    pub fn insert(&self, order: Arc<Order>) {
        order.mark_resting();
        let price = order
            .limit_price()
            .expect("only limit orders rest on a book side");
        self.open_volume
            .fetch_add(order.open_quantity(), Ordering::Relaxed);
        let entry = self
            .levels
            .get_or_insert(price, Arc::new(PriceLevel::new(price)));
        entry.value().push_back(order);
    }

    /// Removes a resting order by id from the level at `price`. Returns the
    /// removed order if it was found there.
    pub fn remove(&self, price: Price, order_id: u64) -> Option<Arc<Order>> {
        let level = self.levels.get(&price)?.value().clone();
        let removed = level.remove(order_id)?;
        self.open_volume
            .fetch_sub(removed.open_quantity(), Ordering::Relaxed);
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(removed)
    }

    /// Accounts for `quantity` having just matched against the resting
    /// order at the front of the level at `price`. If that order is now
    /// fully closed, pops it off the level's queue; if the level is now
    /// empty, removes it from the ladder entirely.
    pub fn apply_match(&self, price: Price, quantity: u64, resting_closed: bool) {
        self.open_volume.fetch_sub(quantity, Ordering::Relaxed);
        if let Some(entry) = self.levels.get(&price) {
            let level = entry.value();
            level.record_partial_match(quantity);
            if resting_closed {
                level.pop_front();
            }
            if level.is_empty() {
                self.levels.remove(&price);
            }
        }
    }
}
