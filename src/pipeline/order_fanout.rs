//! C6: drains the order-update queue and delivers each update to the
//! client that owns the order.

use std::sync::Arc;

use crossbeam::channel::Receiver;
use tracing::{info, warn};

use crate::notifications::OrderUpdate;
use crate::subscriptions::SubscriptionTable;

/// Runs until `order_update_rx` disconnects. A client whose callback fails
/// is evicted entirely (it stops receiving order updates *and* market data
/// for every ticker), since a transport failure on this channel almost
/// certainly means the same transport backs its market-data subscriptions.
pub fn run(order_update_rx: Receiver<OrderUpdate>, subscriptions: Arc<SubscriptionTable>) {
    info!("order-update fan-out started");
    for update in order_update_rx.iter() {
        let Some(subscriber) = subscriptions.subscriber(update.client_id) else {
            continue;
        };
        if subscriber.notify_order(&update).is_err() {
            warn!(client_id = update.client_id, order_id = update.order_id, "order update delivery failed");
            subscriptions.evict(update.client_id);
        }
    }
    info!("order-update fan-out stopped");
}
