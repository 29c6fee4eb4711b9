//! C7: drains the market-data queue and delivers trades/quotes to every
//! subscriber of the ticker they concern.

use std::sync::Arc;

use crossbeam::channel::Receiver;
use tracing::{info, warn};

use crate::notifications::MarketDataEvent;
use crate::subscriptions::SubscriptionTable;

/// Runs until `market_data_rx` disconnects. Unlike the order-update
/// fan-out, a failing subscriber here is only removed from the one
/// ticker's list — it keeps receiving market data for other tickers and
/// keeps receiving its own order updates.
pub fn run(market_data_rx: Receiver<MarketDataEvent>, subscriptions: Arc<SubscriptionTable>) {
    info!("market-data fan-out started");
    for event in market_data_rx.iter() {
        let ticker = event.ticker().to_string();
        for client_id in subscriptions.subscribers_for(&ticker) {
            let Some(subscriber) = subscriptions.subscriber(client_id) else {
                continue;
            };
            let result = match &event {
                MarketDataEvent::Trade(trade) => subscriber.notify_trade(trade),
                MarketDataEvent::Quote(quote) => subscriber.notify_quote(quote),
            };
            if result.is_err() {
                warn!(client_id, ticker = %ticker, "market data delivery failed");
                subscriptions.evict_from_ticker(client_id, &ticker);
            }
        }
    }
    info!("market-data fan-out stopped");
}
