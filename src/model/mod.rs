//! Order and price primitives (component C1 of the exchange).

pub mod order;
pub mod price;

pub use order::{Fill, Order, OrderKind, OrderSnapshot, OrderStatus, OverfillError, Side};
pub use price::Price;
