//! Crate-wide error type.
//!
//! Follows the same convention as `orderbook::error::OrderBookError`: a plain
//! enum with a hand-written `Display` impl rather than a `thiserror` derive.

use std::fmt;

/// Errors returned synchronously from [`crate::ExchangeFacade`] entry points.
///
/// Rejections that occur *after* an order has been accepted (e.g. a market
/// order with no resting liquidity on the other side) are not represented
/// here — they are delivered asynchronously as an [`crate::OrderStatus::Rejected`]
/// order update, per the notification pipeline.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ExchangeError {
    /// The ticker named in the call has not been registered.
    UnknownTicker { ticker: String },
    /// `side` was neither `"BUY"` nor `"SELL"` (case-insensitive).
    UnknownSide { value: String },
    /// `order_type` was neither `"LIMIT"` nor `"MARKET"` (case-insensitive).
    UnknownOrderKind { value: String },
    /// A limit price was negative.
    NegativePrice { price: f64 },
    /// A quantity was zero or negative.
    NonPositiveQuantity { quantity: i64 },
    /// `client_id` has never been returned by `register`.
    UnknownClient { client_id: u64 },
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::UnknownTicker { ticker } => {
                write!(f, "ticker '{ticker}' is not registered")
            }
            ExchangeError::UnknownSide { value } => {
                write!(f, "'{value}' is not a recognized order side")
            }
            ExchangeError::UnknownOrderKind { value } => {
                write!(f, "'{value}' is not a recognized order type")
            }
            ExchangeError::NegativePrice { price } => {
                write!(f, "price {price} is negative")
            }
            ExchangeError::NonPositiveQuantity { quantity } => {
                write!(f, "quantity {quantity} is not positive")
            }
            ExchangeError::UnknownClient { client_id } => {
                write!(f, "client {client_id} is not registered")
            }
        }
    }
}

impl std::error::Error for ExchangeError {}
