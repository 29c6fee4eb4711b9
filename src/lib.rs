//! A multi-instrument, in-memory limit-order-book exchange simulator.
//!
//! [`ExchangeFacade`] is the entry point: register instruments, register
//! subscriber handles, submit and cancel orders, and read back per-
//! instrument statistics and book snapshots. Internally, accepted orders
//! flow through a three-queue concurrent pipeline — a dispatcher thread
//! runs price-time priority matching per instrument, and two fan-out
//! threads deliver order updates and public trade/quote prints to
//! subscribers.
//!
//! Out of scope: transport, persistence, authentication, cross-instrument
//! atomic operations, position/account/credit checks, and fees — this
//! crate models a single matching venue's core mechanics, not the trading
//! stack around it.

pub mod book;
pub mod config;
pub mod directory;
pub mod error;
pub mod facade;
pub mod instrument;
pub mod matching;
pub mod model;
pub mod notifications;
pub mod pipeline;
pub mod subscriptions;
pub mod time;

pub use config::ExchangeConfig;
pub use error::ExchangeError;
pub use facade::ExchangeFacade;
pub use instrument::{BookLevelSnapshot, Instrument};
pub use model::{Fill, Order, OrderKind, OrderSnapshot, OrderStatus, Price, Side};
pub use notifications::{DeliveryError, ExchangeSubscriber, MarketDataEvent, OrderUpdate, QuoteUpdate, TradePrint};
pub use pipeline::DiagnosticEvent;
