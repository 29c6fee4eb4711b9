//! Order identity, lifecycle, and state machine.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::model::price::Price;
use crate::time;

/// Which side of the book an order rests on, or which side it aggresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        })
    }
}

/// Limit orders rest on the book when unmatched; market orders never rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OrderKind {
    Limit,
    Market,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderKind::Limit => "LIMIT",
            OrderKind::Market => "MARKET",
        })
    }
}

/// Lifecycle state. `Filled` and `Cancelled` are terminal; `Rejected` is
/// terminal and is reached only before any quantity executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        })
    }
}

/// One execution against an order: the quantity that traded, the trade
/// price, and the entry-time-scale timestamp the trade occurred at.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Fill {
    pub quantity: u64,
    pub price: Price,
    pub trade_time_ns: u64,
}

/// Raised when a caller tries to execute more volume than an order has open.
/// This can only happen if the matching engine's own bookkeeping is wrong;
/// callers treat it as fatal (see `crate::pipeline::dispatcher`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverfillError {
    pub requested: u64,
    pub open: u64,
}

impl fmt::Display for OverfillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted to execute {} against {} open",
            self.requested, self.open
        )
    }
}

impl std::error::Error for OverfillError {}

#[derive(Debug)]
struct OrderState {
    open_quantity: u64,
    executed_quantity: u64,
    effective_price: Option<Price>,
    status: OrderStatus,
    trades: Vec<Fill>,
}

/// A single order.
///
/// Identity fields (`id`, `client_id`, `ticker`, `side`, `kind`,
/// `original_quantity`, `limit_price`, `entry_time_ns`) never change after
/// construction. Mutable fields live behind an `RwLock` so that the single
/// writer (the dispatcher thread owning this order's instrument) never
/// blocks the many concurrent readers (facade queries, notification
/// fan-out) on anything heavier than a read lock, and so readers never
/// observe a torn combination of fields mid-update.
#[derive(Debug)]
pub struct Order {
    id: u64,
    client_id: u64,
    ticker: String,
    side: Side,
    kind: OrderKind,
    original_quantity: u64,
    limit_price: Option<Price>,
    entry_time_ns: u64,
    state: RwLock<OrderState>,
}

impl Order {
    /// Constructs a new order, assigning it the next id from `id_counter`
    /// and an entry time from the process-wide monotonic clock.
    pub fn new(
        id_counter: &Arc<AtomicU64>,
        client_id: u64,
        ticker: impl Into<String>,
        side: Side,
        kind: OrderKind,
        quantity: u64,
        limit_price: Option<Price>,
    ) -> Arc<Order> {
        let id = id_counter.fetch_add(1, Ordering::Relaxed);
        Arc::new(Order {
            id,
            client_id,
            ticker: ticker.into(),
            side,
            kind,
            original_quantity: quantity,
            limit_price,
            entry_time_ns: time::next_entry_time_ns(),
            state: RwLock::new(OrderState {
                open_quantity: quantity,
                executed_quantity: 0,
                effective_price: limit_price,
                status: OrderStatus::New,
                trades: Vec::new(),
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    pub fn original_quantity(&self) -> u64 {
        self.original_quantity
    }

    pub fn limit_price(&self) -> Option<Price> {
        self.limit_price
    }

    pub fn entry_time_ns(&self) -> u64 {
        self.entry_time_ns
    }

    pub fn open_quantity(&self) -> u64 {
        self.state.read().unwrap().open_quantity
    }

    pub fn executed_quantity(&self) -> u64 {
        self.state.read().unwrap().executed_quantity
    }

    pub fn status(&self) -> OrderStatus {
        self.state.read().unwrap().status
    }

    /// Price used for matching and for stats purposes: the limit price for
    /// a limit order, or the most recently observed effective price for a
    /// market order (set before and refreshed during matching).
    pub fn effective_price(&self) -> Option<Price> {
        self.state.read().unwrap().effective_price
    }

    /// The most recent fill, if any. Bundles `last_executed_price` and
    /// `last_executed_volume` into one accessor (`Fill::price` /
    /// `Fill::quantity`) rather than exposing them separately; `None` when
    /// nothing has executed yet, matching their "undefined when no trades"
    /// spec behavior.
    pub fn last_fill(&self) -> Option<Fill> {
        self.state.read().unwrap().trades.last().copied()
    }

    /// Whether this order has fully executed (`status == Filled`). Distinct
    /// from `is_closed`, which is also true for `Cancelled`/`Rejected`.
    pub fn is_filled(&self) -> bool {
        self.status() == OrderStatus::Filled
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self.status(),
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Average executed price across all fills so far, half-up rounded.
    /// `Price::ZERO` if nothing has executed yet.
    pub fn average_executed_price(&self) -> Price {
        let state = self.state.read().unwrap();
        if state.executed_quantity == 0 {
            return Price::ZERO;
        }
        let notional: i128 = state
            .trades
            .iter()
            .map(|f| f.price.raw() as i128 * f.quantity as i128)
            .sum();
        Price::from_raw(crate::model::price::round_half_up_div(
            notional,
            state.executed_quantity as i128,
        ))
    }

    /// Sets the effective price a market order will trade at. Called once
    /// before matching begins (against the opposing book's best price) and
    /// again as matching walks into subsequent price levels.
    pub fn set_effective_price(&self, price: Price) {
        debug_assert_eq!(self.kind, OrderKind::Market);
        self.state.write().unwrap().effective_price = Some(price);
    }

    /// Marks a never-executed order resident on the book. A no-op if the
    /// order already has fills, so a partially-filled order that gets
    /// reinserted after a match keeps its `PartiallyFilled` status rather
    /// than reverting to `New`.
    pub fn mark_resting(&self) {
        let mut state = self.state.write().unwrap();
        if state.executed_quantity == 0 {
            state.status = OrderStatus::New;
        }
    }

    /// Records a trade execution, updating open/executed quantity and
    /// status. Returns [`OverfillError`] if `quantity` exceeds what remains
    /// open — this should be unreachable given correct matching logic, and
    /// callers treat it as an invariant violation.
    pub fn execute(&self, quantity: u64, price: Price, trade_time_ns: u64) -> Result<(), OverfillError> {
        let mut state = self.state.write().unwrap();
        if quantity > state.open_quantity {
            return Err(OverfillError {
                requested: quantity,
                open: state.open_quantity,
            });
        }
        state.open_quantity -= quantity;
        state.executed_quantity += quantity;
        state.trades.push(Fill {
            quantity,
            price,
            trade_time_ns,
        });
        state.status = if state.open_quantity == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        Ok(())
    }

    /// Zeros open quantity without touching executed quantity. Used for
    /// both client-initiated cancellation (status becomes `Cancelled`) and
    /// for a market order's unfillable residual (status stays whatever it
    /// already was — `PartiallyFilled` if it traded at all, `Rejected` if
    /// it never did).
    pub fn cancel(&self) {
        let mut state = self.state.write().unwrap();
        state.open_quantity = 0;
        state.status = OrderStatus::Cancelled;
    }

    /// Zeros a market order's unfillable residual quantity without marking
    /// it cancelled: the order already executed part of its size, so it
    /// stays `PartiallyFilled` rather than picking up a status that implies
    /// a client asked for it to stop.
    pub fn cancel_residual(&self) {
        let mut state = self.state.write().unwrap();
        debug_assert_eq!(self.kind, OrderKind::Market);
        state.open_quantity = 0;
        if state.executed_quantity > 0 {
            state.status = OrderStatus::PartiallyFilled;
        }
    }

    /// Marks an order rejected outright (no liquidity at all to match
    /// against for a market order). Only valid before any execution.
    pub fn reject(&self) {
        let mut state = self.state.write().unwrap();
        debug_assert_eq!(state.executed_quantity, 0);
        state.open_quantity = 0;
        state.status = OrderStatus::Rejected;
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        let state = self.state.read().unwrap();
        OrderSnapshot {
            order_id: self.id,
            client_id: self.client_id,
            ticker: self.ticker.clone(),
            side: self.side,
            kind: self.kind,
            original_quantity: self.original_quantity,
            limit_price: self.limit_price,
            entry_time_ns: self.entry_time_ns,
            open_quantity: state.open_quantity,
            executed_quantity: state.executed_quantity,
            effective_price: state.effective_price,
            status: state.status,
            last_fill: state.trades.last().copied(),
        }
    }
}

/// Read-only view of an order, safe to hand to callers outside the
/// dispatcher thread.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSnapshot {
    pub order_id: u64,
    pub client_id: u64,
    pub ticker: String,
    pub side: Side,
    pub kind: OrderKind,
    pub original_quantity: u64,
    pub limit_price: Option<Price>,
    pub entry_time_ns: u64,
    pub open_quantity: u64,
    pub executed_quantity: u64,
    pub effective_price: Option<Price>,
    pub status: OrderStatus,
    pub last_fill: Option<Fill>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Arc<AtomicU64> {
        Arc::new(AtomicU64::new(1))
    }

    #[test]
    fn new_limit_order_starts_new_with_full_open_quantity() {
        let order = Order::new(
            &counter(),
            42,
            "ABC",
            Side::Buy,
            OrderKind::Limit,
            100,
            Some(Price::from_f64(10.0)),
        );
        assert_eq!(order.status(), OrderStatus::New);
        assert_eq!(order.open_quantity(), 100);
        assert_eq!(order.executed_quantity(), 0);
    }

    #[test]
    fn partial_execute_transitions_to_partially_filled() {
        let order = Order::new(
            &counter(),
            1,
            "ABC",
            Side::Buy,
            OrderKind::Limit,
            100,
            Some(Price::from_f64(10.0)),
        );
        order.execute(40, Price::from_f64(10.0), 1).unwrap();
        assert_eq!(order.status(), OrderStatus::PartiallyFilled);
        assert_eq!(order.open_quantity(), 60);
        assert_eq!(order.executed_quantity(), 40);
    }

    #[test]
    fn full_execute_transitions_to_filled() {
        let order = Order::new(
            &counter(),
            1,
            "ABC",
            Side::Sell,
            OrderKind::Limit,
            50,
            Some(Price::from_f64(10.0)),
        );
        order.execute(50, Price::from_f64(10.0), 1).unwrap();
        assert_eq!(order.status(), OrderStatus::Filled);
        assert_eq!(order.open_quantity(), 0);
        assert!(order.is_filled());
    }

    #[test]
    fn is_filled_is_false_for_cancelled_orders_even_though_both_are_closed() {
        let order = Order::new(
            &counter(),
            1,
            "ABC",
            Side::Buy,
            OrderKind::Limit,
            50,
            Some(Price::from_f64(10.0)),
        );
        order.cancel();
        assert!(order.is_closed());
        assert!(!order.is_filled());
    }

    #[test]
    fn overfill_is_rejected_without_mutating_state() {
        let order = Order::new(
            &counter(),
            1,
            "ABC",
            Side::Buy,
            OrderKind::Limit,
            10,
            Some(Price::from_f64(10.0)),
        );
        let err = order.execute(11, Price::from_f64(10.0), 1).unwrap_err();
        assert_eq!(err.open, 10);
        assert_eq!(order.open_quantity(), 10);
        assert_eq!(order.status(), OrderStatus::New);
    }

    #[test]
    fn reinserting_a_partially_filled_order_keeps_its_status() {
        let order = Order::new(
            &counter(),
            1,
            "ABC",
            Side::Buy,
            OrderKind::Limit,
            100,
            Some(Price::from_f64(10.0)),
        );
        order.execute(60, Price::from_f64(10.0), 1).unwrap();
        order.mark_resting();
        assert_eq!(order.status(), OrderStatus::PartiallyFilled);
    }

    #[test]
    fn market_order_residual_stays_partially_filled_not_cancelled() {
        let order = Order::new(&counter(), 1, "ABC", Side::Buy, OrderKind::Market, 100, None);
        order.set_effective_price(Price::from_f64(10.0));
        order.execute(30, Price::from_f64(10.0), 1).unwrap();
        order.cancel_residual();
        assert_eq!(order.status(), OrderStatus::PartiallyFilled);
        assert_eq!(order.open_quantity(), 0);
    }

    #[test]
    fn average_executed_price_is_volume_weighted_and_half_up_rounded() {
        let order = Order::new(&counter(), 1, "ABC", Side::Buy, OrderKind::Market, 100, None);
        order.execute(50, Price::from_raw(100_000), 1).unwrap();
        order.execute(50, Price::from_raw(100_001), 2).unwrap();
        // (50*100000 + 50*100001) / 100 = 100000.5 -> half-up -> 100001 (raw ticks)
        assert_eq!(order.average_executed_price().raw(), 100_001);
    }

    #[test]
    fn snapshot_serializes_to_json_with_expected_fields() {
        let order = Order::new(
            &counter(),
            7,
            "ABC",
            Side::Sell,
            OrderKind::Limit,
            100,
            Some(Price::from_f64(24.0612)),
        );
        order.execute(40, Price::from_f64(24.0612), 1).unwrap();
        let json = serde_json::to_string(&order.snapshot()).expect("snapshot should serialize");
        assert!(json.contains("\"client_id\":7"));
        assert!(json.contains("\"status\":\"PartiallyFilled\""));
        assert!(json.contains("\"ticker\":\"ABC\""));
    }
}
