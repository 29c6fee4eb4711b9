//! A single price level: a time-ordered FIFO of resting orders.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::model::{Order, Price};

/// All orders resting at one price, in arrival order.
///
/// `total_open_quantity` is maintained incrementally so depth queries don't
/// need to walk the queue.
pub struct PriceLevel {
    price: Price,
    orders: Mutex<VecDeque<Arc<Order>>>,
    total_open_quantity: AtomicU64,
}

impl PriceLevel {
    pub fn new(price: Price) -> Self {
        PriceLevel {
            price,
            orders: Mutex::new(VecDeque::new()),
            total_open_quantity: AtomicU64::new(0),
        }
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn total_open_quantity(&self) -> u64 {
        self.total_open_quantity.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.orders.lock().unwrap().is_empty()
    }

    pub fn push_back(&self, order: Arc<Order>) {
        self.total_open_quantity
            .fetch_add(order.open_quantity(), Ordering::Relaxed);
        self.orders.lock().unwrap().push_back(order);
    }

    /// The oldest resting order, if any, without removing it.
    pub fn front(&self) -> Option<Arc<Order>> {
        self.orders.lock().unwrap().front().cloned()
    }

    /// Removes the oldest resting order. Callers are expected to have
    /// already driven it to `open_quantity() == 0` via a match.
    pub fn pop_front(&self) -> Option<Arc<Order>> {
        self.orders.lock().unwrap().pop_front()
    }

    /// Accounts for `quantity` having just been matched off the order at
    /// the front of the queue, without removing it from the queue.
    pub fn record_partial_match(&self, quantity: u64) {
        self.total_open_quantity
            .fetch_sub(quantity, Ordering::Relaxed);
    }

    /// Removes a specific order (by id) from anywhere in the queue. Linear
    /// in the number of orders at this price, which is acceptable: book
    /// depth at a single price is bounded in practice and spec explicitly
    /// allows O(n) cancellation.
    pub fn remove(&self, order_id: u64) -> Option<Arc<Order>> {
        let mut orders = self.orders.lock().unwrap();
        let index = orders.iter().position(|o| o.id() == order_id)?;
        let removed = orders.remove(index)?;
        self.total_open_quantity
            .fetch_sub(removed.open_quantity(), Ordering::Relaxed);
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderKind, Side};
    use std::sync::atomic::AtomicU64 as Counter;

    fn order(id_seed: u64, qty: u64) -> Arc<Order> {
        let counter = Arc::new(Counter::new(id_seed));
        Order::new(
            &counter,
            1,
            "ABC",
            Side::Buy,
            OrderKind::Limit,
            qty,
            Some(Price::from_f64(10.0)),
        )
    }

    #[test]
    fn fifo_preserves_arrival_order() {
        let level = PriceLevel::new(Price::from_f64(10.0));
        let a = order(1, 10);
        let b = order(2, 20);
        level.push_back(a.clone());
        level.push_back(b.clone());
        assert_eq!(level.front().unwrap().id(), a.id());
        assert_eq!(level.total_open_quantity(), 30);
        level.pop_front();
        assert_eq!(level.front().unwrap().id(), b.id());
    }

    #[test]
    fn remove_by_id_updates_total_open_quantity() {
        let level = PriceLevel::new(Price::from_f64(10.0));
        let a = order(1, 10);
        let b = order(2, 20);
        level.push_back(a.clone());
        level.push_back(b.clone());
        let removed = level.remove(a.id()).unwrap();
        assert_eq!(removed.id(), a.id());
        assert_eq!(level.total_open_quantity(), 20);
        assert!(level.remove(999).is_none());
    }
}
