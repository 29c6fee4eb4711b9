//! End-to-end scenarios straight out of the exchange's testable-properties
//! list: literal order sequences and the book/statistics/notification state
//! they're expected to produce.
//!
//! Order submission and cancellation are processed asynchronously by the
//! dispatcher thread, so assertions that depend on that processing having
//! completed poll briefly rather than assuming same-call-stack visibility.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lob_exchange::{
    DeliveryError, ExchangeConfig, ExchangeFacade, OrderStatus, OrderUpdate, Price, QuoteUpdate,
    TradePrint,
};

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        if Instant::now() > deadline {
            panic!("condition not met within timeout");
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[derive(Default)]
struct RecordingSubscriber {
    orders: Mutex<Vec<OrderUpdate>>,
    trades: Mutex<Vec<TradePrint>>,
    quotes: Mutex<Vec<QuoteUpdate>>,
    fail_trades: AtomicBool,
    trade_delivery_attempts: AtomicUsize,
}

impl lob_exchange::ExchangeSubscriber for RecordingSubscriber {
    fn notify_order(&self, update: &OrderUpdate) -> Result<(), DeliveryError> {
        self.orders.lock().unwrap().push(update.clone());
        Ok(())
    }

    fn notify_trade(&self, trade: &TradePrint) -> Result<(), DeliveryError> {
        self.trade_delivery_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_trades.load(Ordering::SeqCst) {
            return Err(DeliveryError);
        }
        self.trades.lock().unwrap().push(trade.clone());
        Ok(())
    }

    fn notify_quote(&self, quote: &QuoteUpdate) -> Result<(), DeliveryError> {
        self.quotes.lock().unwrap().push(quote.clone());
        Ok(())
    }
}

fn facade() -> ExchangeFacade {
    ExchangeFacade::new(ExchangeConfig::default())
}

/// Scenario 1: simple limit cross.
#[test]
fn simple_limit_cross() {
    let exchange = facade();
    exchange.register_instrument("GOOG");
    let sub = Arc::new(RecordingSubscriber::default());
    let client = exchange.register(sub.clone());

    let buy_id = exchange
        .submit_order("GOOG", client, "BUY", "LIMIT", 15.00, 100)
        .unwrap();
    exchange
        .submit_order("GOOG", client, "SELL", "LIMIT", 14.00, 60)
        .unwrap();

    wait_until(|| {
        exchange
            .get_client_order(client, buy_id)
            .map(|s| s.status == OrderStatus::PartiallyFilled)
            .unwrap_or(false)
    });

    let buy_snapshot = exchange.get_client_order(client, buy_id).unwrap();
    assert_eq!(buy_snapshot.open_quantity, 40);
    assert_eq!(buy_snapshot.executed_quantity, 60);
    assert_eq!(buy_snapshot.status, OrderStatus::PartiallyFilled);

    assert!(exchange.ask_book_snapshot("GOOG").is_empty());
    assert_eq!(exchange.bid_volume("GOOG"), 40);
    assert_eq!(exchange.last_traded_price("GOOG"), Some(Price::from_f64(15.00)));
    assert_eq!(exchange.buy_volume("GOOG"), 60);
    assert_eq!(exchange.sell_volume("GOOG"), 60);
}

/// Scenario 2: market buy against an empty book is rejected, not queued.
#[test]
fn market_buy_against_empty_book_is_rejected() {
    let exchange = facade();
    exchange.register_instrument("MSFT");
    let sub = Arc::new(RecordingSubscriber::default());
    let client = exchange.register(sub.clone());

    let order_id = exchange
        .submit_order("MSFT", client, "BUY", "MARKET", 0.0, 100)
        .unwrap();

    wait_until(|| {
        exchange
            .get_client_order(client, order_id)
            .map(|s| s.status == OrderStatus::Rejected)
            .unwrap_or(false)
    });

    assert_eq!(exchange.bid_volume("MSFT"), 0);
    assert_eq!(exchange.ask_volume("MSFT"), 0);
    assert!(exchange.bid_book_snapshot("MSFT").is_empty());
    assert!(exchange.ask_book_snapshot("MSFT").is_empty());
    assert!(exchange.last_traded_price("MSFT").is_none());
    assert!(sub.trades.lock().unwrap().is_empty());
    assert!(sub.quotes.lock().unwrap().is_empty());
}

/// Scenario 3: price-time priority — the earlier-arrived order at a tied
/// price fills first.
#[test]
fn price_time_priority_favors_the_earlier_order() {
    let exchange = facade();
    exchange.register_instrument("AAPL");
    let sub = Arc::new(RecordingSubscriber::default());
    let c1 = exchange.register(sub.clone());
    let c2 = exchange.register(sub.clone());
    let c3 = exchange.register(sub.clone());

    let first_id = exchange
        .submit_order("AAPL", c1, "BUY", "LIMIT", 10.00, 50)
        .unwrap();
    let second_id = exchange
        .submit_order("AAPL", c2, "BUY", "LIMIT", 10.00, 50)
        .unwrap();
    exchange
        .submit_order("AAPL", c3, "SELL", "LIMIT", 10.00, 50)
        .unwrap();

    wait_until(|| {
        exchange
            .get_client_order(c1, first_id)
            .map(|s| s.status == OrderStatus::Filled)
            .unwrap_or(false)
    });

    let first = exchange.get_client_order(c1, first_id).unwrap();
    let second = exchange.get_client_order(c2, second_id).unwrap();
    assert_eq!(first.status, OrderStatus::Filled);
    assert_eq!(first.executed_quantity, 50);
    assert_eq!(second.status, OrderStatus::New);
    assert_eq!(second.open_quantity, 50);

    let trades = sub.trades.lock().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].quantity, 50);
    assert_eq!(trades[0].price, Price::from_f64(10.00));
}

/// Scenario 4: depth queries over a prefilled bid book.
#[test]
fn depth_queries_over_a_prefilled_book() {
    let exchange = facade();
    exchange.register_instrument("DEPT");
    let sub = Arc::new(RecordingSubscriber::default());
    let client = exchange.register(sub);

    for (price, qty) in [(24.063, 100), (24.062, 200), (24.061, 300), (24.060, 400)] {
        exchange
            .submit_order("DEPT", client, "BUY", "LIMIT", price, qty)
            .unwrap();
    }

    wait_until(|| exchange.bid_book_snapshot("DEPT").len() == 4);

    assert_eq!(exchange.best_bid("DEPT"), Price::from_f64(24.063));
    assert_eq!(exchange.bid_price_at_depth("DEPT", 0), Price::from_f64(24.063));
    assert_eq!(exchange.bid_price_at_depth("DEPT", 2), Price::from_f64(24.061));
    assert_eq!(exchange.bid_volume_at_price("DEPT", Price::from_f64(24.060)), 400);
    assert_eq!(exchange.bid_volume_at_price("DEPT", Price::from_f64(25.00)), 0);
}

/// Scenario 5: cancel, then cancel again, then confirm the cancelled order
/// no longer participates in matching.
#[test]
fn cancel_then_resubmit() {
    let exchange = facade();
    exchange.register_instrument("X");
    let sub = Arc::new(RecordingSubscriber::default());
    let client = exchange.register(sub);

    let order_id = exchange
        .submit_order("X", client, "BUY", "LIMIT", 20.00, 100)
        .unwrap();
    wait_until(|| !exchange.bid_book_snapshot("X").is_empty());

    let cancelled = exchange.cancel_order(client, order_id).unwrap().unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.open_quantity, 0);

    assert!(exchange.cancel_order(client, order_id).unwrap().is_none());

    let sell_id = exchange
        .submit_order("X", client, "SELL", "LIMIT", 20.00, 100)
        .unwrap();
    wait_until(|| exchange.get_client_order(client, sell_id).is_some());
    std::thread::sleep(Duration::from_millis(20));
    let sell = exchange.get_client_order(client, sell_id).unwrap();
    assert_eq!(sell.status, OrderStatus::New);
    assert_eq!(sell.executed_quantity, 0);
}

/// Scenario 6: a subscriber whose trade delivery fails is evicted from
/// that ticker's market-data list, but keeps receiving its own order
/// updates, and other subscribers are unaffected.
#[test]
fn subscriber_eviction_on_trade_delivery_failure() {
    let exchange = facade();
    exchange.register_instrument("T");

    let failing = Arc::new(RecordingSubscriber::default());
    failing.fail_trades.store(true, Ordering::SeqCst);
    let failing_client = exchange.register(failing.clone());
    exchange.subscribe(failing_client, "T").unwrap();

    let healthy = Arc::new(RecordingSubscriber::default());
    let healthy_client = exchange.register(healthy.clone());
    exchange.subscribe(healthy_client, "T").unwrap();

    exchange
        .submit_order("T", healthy_client, "SELL", "LIMIT", 5.00, 10)
        .unwrap();
    exchange
        .submit_order("T", healthy_client, "BUY", "LIMIT", 5.00, 10)
        .unwrap();

    wait_until(|| failing.trade_delivery_attempts.load(Ordering::SeqCst) >= 1);
    wait_until(|| !healthy.trades.lock().unwrap().is_empty());
    // give the eviction a moment to land before the second trade
    std::thread::sleep(Duration::from_millis(20));

    exchange
        .submit_order("T", healthy_client, "SELL", "LIMIT", 5.00, 10)
        .unwrap();
    exchange
        .submit_order("T", healthy_client, "BUY", "LIMIT", 5.00, 10)
        .unwrap();

    wait_until(|| healthy.trades.lock().unwrap().len() >= 2);

    // The failing subscriber never got a second attempt: exactly one trade
    // delivery was attempted to it before eviction from T's list.
    assert_eq!(failing.trade_delivery_attempts.load(Ordering::SeqCst), 1);
    assert!(failing.trades.lock().unwrap().is_empty());
    assert_eq!(healthy.trades.lock().unwrap().len(), 2);
}
