//! Subscriber registry: who gets order updates, and who gets market data
//! for which ticker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};
use tracing::warn;

use crate::notifications::ExchangeSubscriber;

/// Stride used when minting client ids. Non-unit by design: the ids handed
/// out are not meant to double as a dense index or a count of registered
/// clients.
const CLIENT_ID_STRIDE: u64 = 7;

/// Registered subscribers and the ticker-scoped market-data fan-out lists.
pub struct SubscriptionTable {
    next_client_id: AtomicU64,
    subscribers: DashMap<u64, Arc<dyn ExchangeSubscriber>>,
    ticker_subscribers: DashMap<String, DashSet<u64>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        SubscriptionTable {
            next_client_id: AtomicU64::new(CLIENT_ID_STRIDE),
            subscribers: DashMap::new(),
            ticker_subscribers: DashMap::new(),
        }
    }

    /// Registers a subscriber handle and returns the client id it will be
    /// addressed by for both order updates and ticker subscriptions.
    pub fn register(&self, subscriber: Arc<dyn ExchangeSubscriber>) -> u64 {
        let client_id = self.next_client_id.fetch_add(CLIENT_ID_STRIDE, Ordering::Relaxed);
        self.subscribers.insert(client_id, subscriber);
        client_id
    }

    pub fn subscribe(&self, client_id: u64, ticker: &str) {
        self.ticker_subscribers
            .entry(ticker.to_string())
            .or_default()
            .insert(client_id);
    }

    pub fn unsubscribe(&self, client_id: u64, ticker: &str) {
        if let Some(subscribers) = self.ticker_subscribers.get(ticker) {
            subscribers.remove(&client_id);
        }
    }

    pub fn subscriber(&self, client_id: u64) -> Option<Arc<dyn ExchangeSubscriber>> {
        self.subscribers.get(&client_id).map(|e| e.value().clone())
    }

    pub fn subscribers_for(&self, ticker: &str) -> Vec<u64> {
        self.ticker_subscribers
            .get(ticker)
            .map(|set| set.iter().map(|id| *id).collect())
            .unwrap_or_default()
    }

    /// Removes a client entirely: it stops receiving order updates *and*
    /// market data for every ticker. Drops its entry in `subscribers` and
    /// scrubs it from every ticker's subscriber set, so it isn't walked as
    /// a dead entry by the market-data fan-out on subsequent trades/quotes.
    pub fn evict(&self, client_id: u64) {
        warn!(client_id, "evicting subscriber after delivery failure");
        self.subscribers.remove(&client_id);
        for entry in self.ticker_subscribers.iter() {
            entry.value().remove(&client_id);
        }
    }

    /// Removes a client from one ticker's market-data fan-out list only;
    /// it keeps receiving order updates and market data for other tickers.
    pub fn evict_from_ticker(&self, client_id: u64, ticker: &str) {
        warn!(client_id, ticker, "evicting subscriber from ticker after delivery failure");
        if let Some(subscribers) = self.ticker_subscribers.get(ticker) {
            subscribers.remove(&client_id);
        }
    }
}

impl Default for SubscriptionTable {
    fn default() -> Self {
        Self::new()
    }
}
