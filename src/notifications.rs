//! Notification payloads and subscriber trait objects (the delivery side
//! of components C6/C7).

use crate::model::{OrderStatus, Price, Side};

/// Returned by a subscriber callback when delivery could not be completed
/// (e.g. the transport it wraps has disconnected). The fan-out worker
/// treats any `Err` the same way regardless of cause: it evicts the
/// subscriber and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryError;

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("subscriber callback failed to deliver")
    }
}

impl std::error::Error for DeliveryError {}

/// A change in one order's state, sent to the client that owns it.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order_id: u64,
    pub client_id: u64,
    pub ticker: String,
    pub status: OrderStatus,
    pub open_quantity: u64,
    pub executed_quantity: u64,
    pub average_executed_price: Price,
    pub time_ms: u64,
}

/// A public trade print, sent to every subscriber of the traded ticker.
#[derive(Debug, Clone)]
pub struct TradePrint {
    pub ticker: String,
    pub time_ms: u64,
    pub aggressor_side: Side,
    pub price: Price,
    pub quantity: u64,
}

/// A best-bid/best-ask update, sent to every subscriber of the ticker.
#[derive(Debug, Clone)]
pub struct QuoteUpdate {
    pub ticker: String,
    pub time_ms: u64,
    pub bid_price: Price,
    pub ask_price: Price,
}

/// A unit of market data: either a trade print or a quote update, multiplexed
/// onto the single market-data queue the fan-out worker drains.
#[derive(Debug, Clone)]
pub enum MarketDataEvent {
    Trade(TradePrint),
    Quote(QuoteUpdate),
}

impl MarketDataEvent {
    pub fn ticker(&self) -> &str {
        match self {
            MarketDataEvent::Trade(t) => &t.ticker,
            MarketDataEvent::Quote(q) => &q.ticker,
        }
    }
}

/// A client-supplied callback surface for both order-update delivery and
/// market-data delivery. The engine never inspects the handle beyond
/// invoking these methods — it is free to wrap a socket, a queue, an
/// in-process channel, or a test double.
pub trait ExchangeSubscriber: Send + Sync {
    fn notify_order(&self, update: &OrderUpdate) -> Result<(), DeliveryError>;
    fn notify_trade(&self, trade: &TradePrint) -> Result<(), DeliveryError>;
    fn notify_quote(&self, quote: &QuoteUpdate) -> Result<(), DeliveryError>;
}
