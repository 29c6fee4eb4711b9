//! The three-queue concurrent pipeline: dispatcher (C5) and fan-out workers
//! (C6, C7).

pub mod dispatcher;
pub mod market_fanout;
pub mod order_fanout;

use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::model::{Order, OrderSnapshot};

/// One unit of work on the submitted-order queue: the order plus which
/// instrument it targets, so the dispatcher doesn't need to re-derive the
/// ticker from the order (it's already on `Order`, but carrying it
/// alongside keeps the queue payload self-contained and cheap to route).
pub struct SubmittedOrder {
    pub ticker: String,
    pub order: Arc<Order>,
}

/// A cancellation request routed through the same queue as order
/// submission, so that — per the spec's "instrument state is mutated only
/// by the dispatcher thread" rule — a cancel can never race a concurrent
/// match on the same instrument. `reply` carries the outcome back to the
/// blocked caller: `Some(snapshot)` of the now-cancelled order if it was
/// found resting and cancelled, `None` otherwise (unknown order, wrong
/// owner, already terminal, or the instrument is halted).
pub struct CancelRequest {
    pub ticker: String,
    pub client_id: u64,
    pub order_id: u64,
    pub reply: Sender<Option<OrderSnapshot>>,
}

/// The dispatcher's single input queue carries both kinds of work so that
/// submissions and cancellations against the same instrument are always
/// interleaved in submission order, never reordered relative to each other.
pub enum DispatchItem {
    Submit(SubmittedOrder),
    Cancel(CancelRequest),
}

/// A fatal-for-one-instrument event, surfaced out of band so a caller can
/// observe that an instrument stopped processing without needing to catch
/// the panic itself.
#[derive(Debug, Clone)]
pub struct DiagnosticEvent {
    pub ticker: String,
    pub message: String,
}
