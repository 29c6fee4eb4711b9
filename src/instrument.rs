//! A single tradable instrument: its two book sides plus running statistics
//! (component C3).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::atomic::AtomicCell;
use dashmap::{DashMap, DashSet};
use serde::Serialize;

use crate::book::OrderBookSide;
use crate::model::price::round_half_up_div;
use crate::model::{Order, OrderSnapshot, Price, Side};

/// Σ(price·quantity) and Σ(quantity) accumulators for a volume-weighted
/// average price. Updated only from the single thread that owns this
/// instrument, so plain load/store is sufficient — there is never a
/// concurrent writer to race against.
struct Accumulator {
    sum_notional: AtomicCell<i128>,
    sum_quantity: AtomicCell<u128>,
}

impl Accumulator {
    fn new() -> Self {
        Accumulator {
            sum_notional: AtomicCell::new(0),
            sum_quantity: AtomicCell::new(0),
        }
    }

    fn add(&self, quantity: u64, price: Price) {
        let notional = price.raw() as i128 * quantity as i128;
        self.sum_notional.store(self.sum_notional.load() + notional);
        self.sum_quantity
            .store(self.sum_quantity.load() + quantity as u128);
    }

    fn average(&self) -> Price {
        let quantity = self.sum_quantity.load();
        if quantity == 0 {
            return Price::ZERO;
        }
        Price::from_raw(round_half_up_div(self.sum_notional.load(), quantity as i128))
    }
}

/// Running per-instrument statistics, updated exclusively by the dispatcher
/// thread that owns this instrument and read concurrently by everyone else.
struct InstrumentStats {
    last_traded_price: AtomicCell<i64>,
    buy_volume: AtomicU64,
    sell_volume: AtomicU64,
    overall: Accumulator,
    buy_avg: Accumulator,
    sell_avg: Accumulator,
    bid_vwap: Accumulator,
    ask_vwap: Accumulator,
    bid_high: AtomicCell<i64>,
    bid_low: AtomicCell<i64>,
    ask_high: AtomicCell<i64>,
    ask_low: AtomicCell<i64>,
}

impl InstrumentStats {
    fn new() -> Self {
        InstrumentStats {
            last_traded_price: AtomicCell::new(0),
            buy_volume: AtomicU64::new(0),
            sell_volume: AtomicU64::new(0),
            overall: Accumulator::new(),
            buy_avg: Accumulator::new(),
            sell_avg: Accumulator::new(),
            bid_vwap: Accumulator::new(),
            ask_vwap: Accumulator::new(),
            bid_high: AtomicCell::new(0),
            bid_low: AtomicCell::new(0),
            ask_high: AtomicCell::new(0),
            ask_low: AtomicCell::new(0),
        }
    }
}

/// A price/quantity pair in a point-in-time book snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BookLevelSnapshot {
    pub price: Price,
    pub quantity: u64,
}

/// One tradable instrument: its bid/ask ladders, the authoritative registry
/// of every order ever submitted to it, and its running statistics.
///
/// `orders` never shrinks — cancelled and filled orders stay in it for the
/// life of the process, which is what guarantees `filled_orders` and
/// `partially_filled_orders` can hold onto order ids (not `Arc<Order>`
/// clones) without the underlying order ever being dropped out from under
/// them.
pub struct Instrument {
    ticker: String,
    pub(crate) bids: OrderBookSide,
    pub(crate) asks: OrderBookSide,
    orders: DashMap<u64, Arc<Order>>,
    filled_orders: DashSet<u64>,
    partially_filled_orders: DashSet<u64>,
    stats: InstrumentStats,
}

impl Instrument {
    pub fn new(ticker: impl Into<String>) -> Self {
        Instrument {
            ticker: ticker.into(),
            bids: OrderBookSide::new(Side::Buy),
            asks: OrderBookSide::new(Side::Sell),
            orders: DashMap::new(),
            filled_orders: DashSet::new(),
            partially_filled_orders: DashSet::new(),
            stats: InstrumentStats::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub(crate) fn register_order(&self, order: Arc<Order>) {
        self.orders.insert(order.id(), order);
    }

    pub(crate) fn order(&self, order_id: u64) -> Option<Arc<Order>> {
        self.orders.get(&order_id).map(|e| e.value().clone())
    }

    pub(crate) fn mark_filled(&self, order_id: u64) {
        self.filled_orders.insert(order_id);
        self.partially_filled_orders.remove(&order_id);
    }

    pub(crate) fn mark_partially_filled(&self, order_id: u64) {
        self.partially_filled_orders.insert(order_id);
    }

    pub(crate) fn unmark_partially_filled(&self, order_id: u64) {
        self.partially_filled_orders.remove(&order_id);
    }

    pub(crate) fn book_side(&self, side: Side) -> &OrderBookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub fn best_bid(&self) -> Price {
        self.bids.best_price().unwrap_or(Price::ZERO)
    }

    pub fn best_ask(&self) -> Price {
        self.asks.best_price().unwrap_or(Price::ZERO)
    }

    pub fn bid_price_at_depth(&self, depth: usize) -> Price {
        self.bids.price_at_depth(depth).unwrap_or(Price::ZERO)
    }

    pub fn ask_price_at_depth(&self, depth: usize) -> Price {
        self.asks.price_at_depth(depth).unwrap_or(Price::ZERO)
    }

    pub fn bid_volume_at_price(&self, price: Price) -> u64 {
        self.bids.volume_at_price(price)
    }

    pub fn ask_volume_at_price(&self, price: Price) -> u64 {
        self.asks.volume_at_price(price)
    }

    pub fn bid_volume(&self) -> u64 {
        self.bids.open_volume()
    }

    pub fn ask_volume(&self) -> u64 {
        self.asks.open_volume()
    }

    pub fn buy_volume(&self) -> u64 {
        self.stats.buy_volume.load(Ordering::Relaxed)
    }

    pub fn sell_volume(&self) -> u64 {
        self.stats.sell_volume.load(Ordering::Relaxed)
    }

    pub fn last_traded_price(&self) -> Option<Price> {
        let raw = self.stats.last_traded_price.load();
        (raw != 0).then(|| Price::from_raw(raw))
    }

    pub fn average_price(&self) -> Price {
        self.stats.overall.average()
    }

    pub fn average_buy_price(&self) -> Price {
        self.stats.buy_avg.average()
    }

    pub fn average_sell_price(&self) -> Price {
        self.stats.sell_avg.average()
    }

    pub fn bid_vwap(&self) -> Price {
        self.stats.bid_vwap.average()
    }

    pub fn ask_vwap(&self) -> Price {
        self.stats.ask_vwap.average()
    }

    pub fn bid_high(&self) -> Price {
        Price::from_raw(self.stats.bid_high.load())
    }

    pub fn bid_low(&self) -> Price {
        Price::from_raw(self.stats.bid_low.load())
    }

    pub fn ask_high(&self) -> Price {
        Price::from_raw(self.stats.ask_high.load())
    }

    pub fn ask_low(&self) -> Price {
        Price::from_raw(self.stats.ask_low.load())
    }

    /// Updates the side-specific VWAP/high/low statistics from an incoming
    /// order's (quantity, price) before matching begins. `price` is the
    /// order's limit price, or a market order's effective price against the
    /// opposing book.
    pub(crate) fn record_incoming_order(&self, side: Side, quantity: u64, price: Price) {
        if price.is_zero() {
            return;
        }
        match side {
            Side::Buy => {
                self.stats.bid_vwap.add(quantity, price);
                if price.raw() > self.stats.bid_high.load() {
                    self.stats.bid_high.store(price.raw());
                }
                // The low only latches on the first non-zero observation —
                // an intentional quirk carried over from the design this
                // implements rather than a running minimum.
                if self.stats.bid_low.load() == 0 {
                    self.stats.bid_low.store(price.raw());
                }
            }
            Side::Sell => {
                self.stats.ask_vwap.add(quantity, price);
                if price.raw() > self.stats.ask_high.load() {
                    self.stats.ask_high.store(price.raw());
                }
                if self.stats.ask_low.load() == 0 {
                    self.stats.ask_low.store(price.raw());
                }
            }
        }
    }

    /// Updates trade-level statistics (last price, per-side traded volume,
    /// aggressor-side average, overall average) for one match.
    ///
    /// `buy_volume`/`sell_volume` are *not* partitioned by aggressor: every
    /// match has one buy-side participant and one sell-side participant, so
    /// both accumulate the matched quantity on every trade. Only the
    /// average-price statistics are partitioned by which side was the
    /// aggressor — this asymmetry is documented behavior (see spec §4.3),
    /// not an inconsistency.
    pub(crate) fn record_trade(&self, aggressor_side: Side, quantity: u64, price: Price) {
        self.stats.last_traded_price.store(price.raw());
        self.stats.overall.add(quantity, price);
        self.stats.buy_volume.fetch_add(quantity, Ordering::Relaxed);
        self.stats.sell_volume.fetch_add(quantity, Ordering::Relaxed);
        match aggressor_side {
            Side::Buy => self.stats.buy_avg.add(quantity, price),
            Side::Sell => self.stats.sell_avg.add(quantity, price),
        }
    }

    pub fn bid_book_snapshot(&self) -> Vec<BookLevelSnapshot> {
        self.bids
            .levels_best_first()
            .map(|level| BookLevelSnapshot {
                price: level.price(),
                quantity: level.total_open_quantity(),
            })
            .collect()
    }

    pub fn ask_book_snapshot(&self) -> Vec<BookLevelSnapshot> {
        self.asks
            .levels_best_first()
            .map(|level| BookLevelSnapshot {
                price: level.price(),
                quantity: level.total_open_quantity(),
            })
            .collect()
    }

    pub fn order_snapshot(&self, order_id: u64) -> Option<OrderSnapshot> {
        self.order(order_id).map(|o| o.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_average_is_volume_weighted_and_zero_until_used() {
        let acc = Accumulator::new();
        assert_eq!(acc.average(), Price::ZERO);
        acc.add(10, Price::from_f64(10.0));
        acc.add(30, Price::from_f64(11.0));
        // (10*10 + 30*11) / 40 = 10.75
        assert_eq!(acc.average(), Price::from_f64(10.75));
    }

    #[test]
    fn bid_low_latches_on_first_observation_only() {
        let instrument = Instrument::new("ABC");
        instrument.record_incoming_order(Side::Buy, 10, Price::from_f64(10.0));
        instrument.record_incoming_order(Side::Buy, 10, Price::from_f64(5.0));
        // A running minimum would now read 5.0; the documented quirk keeps
        // whatever the first observation was.
        assert_eq!(instrument.bid_low(), Price::from_f64(10.0));
        assert_eq!(instrument.bid_high(), Price::from_f64(10.0));
    }

    #[test]
    fn bid_high_tracks_a_true_running_maximum() {
        let instrument = Instrument::new("ABC");
        instrument.record_incoming_order(Side::Buy, 10, Price::from_f64(10.0));
        instrument.record_incoming_order(Side::Buy, 10, Price::from_f64(12.0));
        instrument.record_incoming_order(Side::Buy, 10, Price::from_f64(11.0));
        assert_eq!(instrument.bid_high(), Price::from_f64(12.0));
    }

    #[test]
    fn record_trade_credits_both_sides_volume_but_only_the_aggressor_average() {
        let instrument = Instrument::new("ABC");
        instrument.record_trade(Side::Buy, 10, Price::from_f64(10.0));
        instrument.record_trade(Side::Sell, 5, Price::from_f64(11.0));
        assert_eq!(instrument.last_traded_price(), Some(Price::from_f64(11.0)));
        // Every match has a buy-side and sell-side leg, so both volumes
        // accumulate every trade's quantity regardless of aggressor.
        assert_eq!(instrument.buy_volume(), 15);
        assert_eq!(instrument.sell_volume(), 15);
        // The average-price statistics stay partitioned by aggressor side.
        assert_eq!(instrument.average_buy_price(), Price::from_f64(10.0));
        assert_eq!(instrument.average_sell_price(), Price::from_f64(11.0));
    }

    #[test]
    fn empty_book_reports_zero_best_prices_not_an_error() {
        let instrument = Instrument::new("ABC");
        assert_eq!(instrument.best_bid(), Price::ZERO);
        assert_eq!(instrument.best_ask(), Price::ZERO);
        assert!(instrument.bid_book_snapshot().is_empty());
    }
}
