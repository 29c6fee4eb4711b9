//! Price-time priority matching (component C4).

use std::sync::Arc;

use crossbeam::channel::Sender;
use tracing::{error, trace};

use crate::instrument::Instrument;
use crate::model::{Order, OrderKind, OrderSnapshot, OrderStatus, Price, Side};
use crate::notifications::{MarketDataEvent, OrderUpdate, QuoteUpdate, TradePrint};
use crate::time;

impl Instrument {
    /// Submits `order` against this instrument's book, matching what it can
    /// and resting the remainder (for limit orders), then publishes order
    /// updates and market data for everything that happened.
    ///
    /// # Panics
    ///
    /// Panics if the matching loop ever tries to execute more volume than
    /// an order has open. That can only happen if this instrument's own
    /// bookkeeping is already wrong, which the dispatcher treats as fatal
    /// for this instrument (see `crate::pipeline::dispatcher`).
    pub fn submit(
        &self,
        order: Arc<Order>,
        order_update_tx: &Sender<OrderUpdate>,
        market_data_tx: &Sender<MarketDataEvent>,
    ) {
        self.register_order(order.clone());
        let aggressor_side = order.side();
        let opposite = self.book_side(aggressor_side.opposite());

        if order.kind() == OrderKind::Market {
            match opposite.best_price() {
                None => {
                    trace!(order_id = order.id(), "market order rejected, book empty");
                    order.reject();
                    self.publish_order_update(&order, order_update_tx);
                    return;
                }
                Some(best) => order.set_effective_price(best),
            }
        }

        let stat_price = order.effective_price().unwrap_or(Price::ZERO);
        self.record_incoming_order(aggressor_side, order.original_quantity(), stat_price);

        let limit_price = order.limit_price();
        'levels: for level in opposite.levels_best_first() {
            if order.open_quantity() == 0 {
                break;
            }
            let level_price = level.price();
            if let Some(limit) = limit_price {
                let crosses = match aggressor_side {
                    Side::Buy => level_price <= limit,
                    Side::Sell => level_price >= limit,
                };
                if !crosses {
                    break 'levels;
                }
            }
            if order.kind() == OrderKind::Market {
                order.set_effective_price(level_price);
            }

            loop {
                if order.open_quantity() == 0 {
                    break;
                }
                let Some(resting) = level.front() else {
                    break;
                };
                let matched_qty = order.open_quantity().min(resting.open_quantity());
                let trade_time_ns = time::next_entry_time_ns();

                if let Err(e) = order.execute(matched_qty, level_price, trade_time_ns) {
                    error!(order_id = order.id(), error = %e, "invariant violation: aggressor overfill");
                    panic!("matching invariant violated on {}: {e}", self.ticker());
                }
                if let Err(e) = resting.execute(matched_qty, level_price, trade_time_ns) {
                    error!(order_id = resting.id(), error = %e, "invariant violation: resting overfill");
                    panic!("matching invariant violated on {}: {e}", self.ticker());
                }

                self.record_trade(aggressor_side, matched_qty, level_price);
                let resting_closed = resting.is_closed();
                opposite.apply_match(level_price, matched_qty, resting_closed);

                if resting_closed {
                    self.mark_filled(resting.id());
                } else {
                    self.mark_partially_filled(resting.id());
                }

                self.publish_order_update(&order, order_update_tx);
                self.publish_order_update(&resting, order_update_tx);
                self.publish_trade(aggressor_side, level_price, matched_qty, market_data_tx);
                self.publish_quote(market_data_tx);

                if resting_closed {
                    continue;
                }
                break;
            }
        }

        if order.open_quantity() == 0 {
            self.mark_filled(order.id());
        } else if order.kind() == OrderKind::Limit {
            self.book_side(aggressor_side).insert(order.clone());
            if order.status() == OrderStatus::PartiallyFilled {
                self.mark_partially_filled(order.id());
            }
        } else {
            order.cancel_residual();
        }

        self.publish_order_update(&order, order_update_tx);
    }

    /// Cancels a resting order on behalf of `client_id`. Returns `None`
    /// (without side effects) if the client doesn't own the order, the
    /// order doesn't exist, or it is no longer resting (already filled,
    /// cancelled, or rejected). On success, returns a snapshot of the order
    /// as it stood immediately after cancellation (status `Cancelled`,
    /// `open_quantity` zero).
    pub fn cancel(
        &self,
        client_id: u64,
        order_id: u64,
        order_update_tx: &Sender<OrderUpdate>,
    ) -> Option<OrderSnapshot> {
        let order = self.order(order_id)?;
        if order.client_id() != client_id {
            return None;
        }
        let price = order.limit_price()?;
        let side = self.book_side(order.side());
        side.remove(price, order_id)?;
        order.cancel();
        self.unmark_partially_filled(order_id);
        self.publish_order_update(&order, order_update_tx);
        Some(order.snapshot())
    }

    fn publish_order_update(&self, order: &Order, tx: &Sender<OrderUpdate>) {
        let snapshot = order.snapshot();
        let update = OrderUpdate {
            order_id: snapshot.order_id,
            client_id: snapshot.client_id,
            ticker: snapshot.ticker,
            status: snapshot.status,
            open_quantity: snapshot.open_quantity,
            executed_quantity: snapshot.executed_quantity,
            average_executed_price: order.average_executed_price(),
            time_ms: time::current_time_millis(),
        };
        let _ = tx.send(update);
    }

    fn publish_trade(&self, aggressor_side: Side, price: Price, quantity: u64, tx: &Sender<MarketDataEvent>) {
        let _ = tx.send(MarketDataEvent::Trade(TradePrint {
            ticker: self.ticker().to_string(),
            time_ms: time::current_time_millis(),
            aggressor_side,
            price,
            quantity,
        }));
    }

    fn publish_quote(&self, tx: &Sender<MarketDataEvent>) {
        let _ = tx.send(MarketDataEvent::Quote(QuoteUpdate {
            ticker: self.ticker().to_string(),
            time_ms: time::current_time_millis(),
            bid_price: self.best_bid(),
            ask_price: self.best_ask(),
        }));
    }
}
