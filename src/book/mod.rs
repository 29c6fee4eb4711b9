//! The order book ladder: price levels and sides (component C2).

pub mod price_level;
pub mod side;

pub use price_level::PriceLevel;
pub use side::OrderBookSide;
