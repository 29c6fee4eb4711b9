//! Tracks which client owns which order, so cancellation and lookups can't
//! cross client boundaries.

use dashmap::{DashMap, DashSet};

/// Maps `client_id -> { order_id }`. Entries are never removed from the
/// outer map once a client has submitted at least one order — only the
/// inner set shrinks, mirroring the teacher's `user_orders: DashMap<Hash32,
/// Vec<Id>>` index used for mass-cancellation-by-user.
#[derive(Default)]
pub struct ClientOrderDirectory {
    orders_by_client: DashMap<u64, DashSet<u64>>,
}

impl ClientOrderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&self, client_id: u64, order_id: u64) {
        self.orders_by_client
            .entry(client_id)
            .or_default()
            .insert(order_id);
    }

    pub fn owns(&self, client_id: u64, order_id: u64) -> bool {
        self.orders_by_client
            .get(&client_id)
            .is_some_and(|orders| orders.contains(&order_id))
    }

    pub fn orders_for(&self, client_id: u64) -> Vec<u64> {
        self.orders_by_client
            .get(&client_id)
            .map(|orders| orders.iter().map(|id| *id).collect())
            .unwrap_or_default()
    }
}
