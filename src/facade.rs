//! The external interface of the exchange simulator (component C8).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Sender};
use dashmap::{DashMap, DashSet};
use tracing::info;

use crate::config::ExchangeConfig;
use crate::error::ExchangeError;
use crate::directory::ClientOrderDirectory;
use crate::instrument::{BookLevelSnapshot, Instrument};
use crate::model::{Order, OrderKind, OrderSnapshot, Price, Side};
use crate::notifications::ExchangeSubscriber;
use crate::pipeline::{dispatcher, market_fanout, order_fanout, CancelRequest, DiagnosticEvent, DispatchItem, SubmittedOrder};
use crate::subscriptions::SubscriptionTable;

fn canonical_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}

fn parse_side(value: &str) -> Result<Side, ExchangeError> {
    if value.eq_ignore_ascii_case("buy") {
        Ok(Side::Buy)
    } else if value.eq_ignore_ascii_case("sell") {
        Ok(Side::Sell)
    } else {
        Err(ExchangeError::UnknownSide {
            value: value.to_string(),
        })
    }
}

fn parse_kind(value: &str) -> Result<OrderKind, ExchangeError> {
    if value.eq_ignore_ascii_case("limit") {
        Ok(OrderKind::Limit)
    } else if value.eq_ignore_ascii_case("market") {
        Ok(OrderKind::Market)
    } else {
        Err(ExchangeError::UnknownOrderKind {
            value: value.to_string(),
        })
    }
}

/// The multi-instrument exchange: order entry, cancellation, subscription
/// management, and the read-only statistics/book surface, all backed by the
/// three-worker concurrent pipeline.
pub struct ExchangeFacade {
    instruments: Arc<DashMap<String, Arc<Instrument>>>,
    order_owner: DashMap<u64, String>,
    directory: Arc<ClientOrderDirectory>,
    subscriptions: Arc<SubscriptionTable>,
    known_clients: DashSet<u64>,
    halted: Arc<DashSet<String>>,
    next_order_id: Arc<AtomicU64>,
    dispatch_tx: Option<Sender<DispatchItem>>,
    order_update_tx: Option<Sender<crate::notifications::OrderUpdate>>,
    diagnostics_rx: crossbeam::channel::Receiver<DiagnosticEvent>,
    dispatcher_handle: Option<JoinHandle<()>>,
    order_fanout_handle: Option<JoinHandle<()>>,
    market_fanout_handle: Option<JoinHandle<()>>,
}

impl ExchangeFacade {
    pub fn new(config: ExchangeConfig) -> Self {
        let (dispatch_tx, dispatch_rx) = bounded(config.queue_capacity);
        let (order_update_tx, order_update_rx) = bounded(config.queue_capacity);
        let (market_data_tx, market_data_rx) = bounded(config.queue_capacity);
        let (diagnostics_tx, diagnostics_rx) = bounded(config.diagnostics_capacity);

        let instruments: Arc<DashMap<String, Arc<Instrument>>> = Arc::new(DashMap::new());
        let subscriptions = Arc::new(SubscriptionTable::new());
        let halted = Arc::new(DashSet::new());

        let dispatcher_handle = {
            let instruments = instruments.clone();
            let order_update_tx = order_update_tx.clone();
            let halted = halted.clone();
            std::thread::Builder::new()
                .name("exchange-dispatcher".into())
                .spawn(move || {
                    dispatcher::run(
                        dispatch_rx,
                        instruments,
                        order_update_tx,
                        market_data_tx,
                        halted,
                        diagnostics_tx,
                    )
                })
                .expect("failed to spawn dispatcher thread")
        };

        let order_fanout_handle = {
            let subscriptions = subscriptions.clone();
            std::thread::Builder::new()
                .name("exchange-order-fanout".into())
                .spawn(move || order_fanout::run(order_update_rx, subscriptions))
                .expect("failed to spawn order-update fan-out thread")
        };

        let market_fanout_handle = {
            let subscriptions = subscriptions.clone();
            std::thread::Builder::new()
                .name("exchange-market-fanout".into())
                .spawn(move || market_fanout::run(market_data_rx, subscriptions))
                .expect("failed to spawn market-data fan-out thread")
        };

        ExchangeFacade {
            instruments,
            order_owner: DashMap::new(),
            directory: Arc::new(ClientOrderDirectory::new()),
            subscriptions,
            known_clients: DashSet::new(),
            halted,
            next_order_id: Arc::new(AtomicU64::new(1)),
            dispatch_tx: Some(dispatch_tx),
            order_update_tx: Some(order_update_tx),
            diagnostics_rx,
            dispatcher_handle: Some(dispatcher_handle),
            order_fanout_handle: Some(order_fanout_handle),
            market_fanout_handle: Some(market_fanout_handle),
        }
    }

    /// Registers a new tradable instrument. Idempotent: registering the
    /// same ticker twice is a no-op.
    pub fn register_instrument(&self, ticker: &str) {
        let ticker = canonical_ticker(ticker);
        self.instruments
            .entry(ticker.clone())
            .or_insert_with(|| {
                info!(ticker = %ticker, "registered instrument");
                Arc::new(Instrument::new(ticker.clone()))
            });
    }

    pub fn registered_tickers(&self) -> Vec<String> {
        self.instruments.iter().map(|e| e.key().clone()).collect()
    }

    /// Registers a subscriber handle, returning the client id it will be
    /// addressed by for order submission, cancellation, and market-data
    /// subscriptions.
    pub fn register(&self, subscriber: Arc<dyn ExchangeSubscriber>) -> u64 {
        let client_id = self.subscriptions.register(subscriber);
        self.known_clients.insert(client_id);
        client_id
    }

    pub fn subscribe(&self, client_id: u64, ticker: &str) -> Result<(), ExchangeError> {
        let ticker = canonical_ticker(ticker);
        if !self.instruments.contains_key(&ticker) {
            return Err(ExchangeError::UnknownTicker { ticker });
        }
        self.subscriptions.subscribe(client_id, &ticker);
        Ok(())
    }

    pub fn unsubscribe(&self, client_id: u64, ticker: &str) {
        self.subscriptions.unsubscribe(client_id, &canonical_ticker(ticker));
    }

    /// Submits a new order. `side` and `order_type` are case-insensitive
    /// `"BUY"`/`"SELL"` and `"LIMIT"`/`"MARKET"` tokens. `price` is ignored
    /// for market orders. Blocks if the submission queue is at capacity.
    pub fn submit_order(
        &self,
        ticker: &str,
        client_id: u64,
        side: &str,
        order_type: &str,
        price: f64,
        quantity: u64,
    ) -> Result<u64, ExchangeError> {
        let ticker = canonical_ticker(ticker);
        if !self.instruments.contains_key(&ticker) {
            return Err(ExchangeError::UnknownTicker { ticker });
        }
        let side = parse_side(side)?;
        let kind = parse_kind(order_type)?;
        if kind == OrderKind::Limit && price < 0.0 {
            return Err(ExchangeError::NegativePrice { price });
        }
        if quantity == 0 {
            return Err(ExchangeError::NonPositiveQuantity {
                quantity: quantity as i64,
            });
        }

        let limit_price = (kind == OrderKind::Limit).then(|| Price::from_f64(price));
        let order = Order::new(
            &self.next_order_id,
            client_id,
            ticker.clone(),
            side,
            kind,
            quantity,
            limit_price,
        );
        let order_id = order.id();
        self.directory.link(client_id, order_id);
        self.order_owner.insert(order_id, ticker.clone());

        self.dispatch_tx
            .as_ref()
            .expect("facade is not shut down")
            .send(DispatchItem::Submit(SubmittedOrder { ticker, order }))
            .expect("dispatcher queue disconnected");
        Ok(order_id)
    }

    /// Cancels a resting order. An unrecognized `client_id` is a synchronous
    /// `VALIDATION` error; everything else that prevents cancellation (the
    /// order doesn't exist, belongs to a different client, or is no longer
    /// resting) is `NOT_CANCELLABLE` and reported as `Ok(None)`, per spec:
    /// not-cancellable carries no notification and is not an error. On
    /// success, returns a snapshot of the now-cancelled order (status
    /// `Cancelled`, `open_quantity` zero), per spec §6's
    /// `cancel_order(...) -> cancelled_order_snapshot | null`.
    ///
    /// Routed through the same queue as order submission rather than
    /// applied directly against the instrument: the dispatcher thread is
    /// the only thread allowed to mutate an instrument's book sides, so a
    /// cancel can never race a concurrent match on the same instrument.
    /// This call blocks until the dispatcher has processed the request.
    pub fn cancel_order(
        &self,
        client_id: u64,
        order_id: u64,
    ) -> Result<Option<OrderSnapshot>, ExchangeError> {
        if !self.known_clients.contains(&client_id) {
            return Err(ExchangeError::UnknownClient { client_id });
        }
        if !self.directory.owns(client_id, order_id) {
            return Ok(None);
        }
        let Some(ticker) = self.order_owner.get(&order_id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let (reply_tx, reply_rx) = bounded(1);
        self.dispatch_tx
            .as_ref()
            .expect("facade is not shut down")
            .send(DispatchItem::Cancel(CancelRequest {
                ticker,
                client_id,
                order_id,
                reply: reply_tx,
            }))
            .expect("dispatcher queue disconnected");
        Ok(reply_rx.recv().unwrap_or(None))
    }

    pub fn get_client_order(&self, client_id: u64, order_id: u64) -> Option<OrderSnapshot> {
        if !self.directory.owns(client_id, order_id) {
            return None;
        }
        let ticker = self.order_owner.get(&order_id)?.value().clone();
        let instrument = self.instruments.get(&ticker)?.value().clone();
        instrument.order_snapshot(order_id)
    }

    /// Drains and returns any diagnostic events recorded since the last
    /// call (e.g. instruments halted by an invariant violation).
    pub fn diagnostics(&self) -> Vec<DiagnosticEvent> {
        self.diagnostics_rx.try_iter().collect()
    }

    pub fn is_halted(&self, ticker: &str) -> bool {
        self.halted.contains(&canonical_ticker(ticker))
    }

    fn with_instrument<T>(&self, ticker: &str, default: T, f: impl FnOnce(&Instrument) -> T) -> T {
        self.instruments
            .get(&canonical_ticker(ticker))
            .map(|e| f(e.value()))
            .unwrap_or(default)
    }

    pub fn best_bid(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.best_bid())
    }

    pub fn best_ask(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.best_ask())
    }

    pub fn bid_price_at_depth(&self, ticker: &str, depth: usize) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.bid_price_at_depth(depth))
    }

    pub fn ask_price_at_depth(&self, ticker: &str, depth: usize) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.ask_price_at_depth(depth))
    }

    pub fn bid_volume_at_price(&self, ticker: &str, price: Price) -> u64 {
        self.with_instrument(ticker, 0, |i| i.bid_volume_at_price(price))
    }

    pub fn ask_volume_at_price(&self, ticker: &str, price: Price) -> u64 {
        self.with_instrument(ticker, 0, |i| i.ask_volume_at_price(price))
    }

    pub fn bid_volume(&self, ticker: &str) -> u64 {
        self.with_instrument(ticker, 0, |i| i.bid_volume())
    }

    pub fn ask_volume(&self, ticker: &str) -> u64 {
        self.with_instrument(ticker, 0, |i| i.ask_volume())
    }

    pub fn buy_volume(&self, ticker: &str) -> u64 {
        self.with_instrument(ticker, 0, |i| i.buy_volume())
    }

    pub fn sell_volume(&self, ticker: &str) -> u64 {
        self.with_instrument(ticker, 0, |i| i.sell_volume())
    }

    pub fn last_traded_price(&self, ticker: &str) -> Option<Price> {
        self.with_instrument(ticker, None, |i| i.last_traded_price())
    }

    pub fn average_price(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.average_price())
    }

    pub fn average_buy_price(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.average_buy_price())
    }

    pub fn average_sell_price(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.average_sell_price())
    }

    pub fn bid_vwap(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.bid_vwap())
    }

    pub fn ask_vwap(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.ask_vwap())
    }

    pub fn bid_high(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.bid_high())
    }

    pub fn bid_low(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.bid_low())
    }

    pub fn ask_high(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.ask_high())
    }

    pub fn ask_low(&self, ticker: &str) -> Price {
        self.with_instrument(ticker, Price::ZERO, |i| i.ask_low())
    }

    pub fn bid_book_snapshot(&self, ticker: &str) -> Vec<BookLevelSnapshot> {
        self.with_instrument(ticker, Vec::new(), |i| i.bid_book_snapshot())
    }

    pub fn ask_book_snapshot(&self, ticker: &str) -> Vec<BookLevelSnapshot> {
        self.with_instrument(ticker, Vec::new(), |i| i.ask_book_snapshot())
    }

    /// Drops the queue senders and joins the three worker threads, in an
    /// order that guarantees none of them can block forever: the
    /// dispatcher only stops once the submission queue disconnects; the
    /// fan-out workers only stop once *all* of their senders are gone,
    /// which for the order-update queue includes a clone the dispatcher
    /// itself holds, so the dispatcher must be joined first.
    pub fn shutdown(mut self) {
        info!("shutting down exchange");
        self.dispatch_tx.take();
        if let Some(handle) = self.dispatcher_handle.take() {
            let _ = handle.join();
        }
        self.order_update_tx.take();
        if let Some(handle) = self.order_fanout_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.market_fanout_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Default for ExchangeFacade {
    fn default() -> Self {
        Self::new(ExchangeConfig::default())
    }
}
