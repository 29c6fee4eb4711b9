//! C5: drains the submitted-order queue and runs each order through its
//! instrument's matching engine.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};
use dashmap::{DashMap, DashSet};
use tracing::{error, info, warn};

use crate::instrument::Instrument;
use crate::notifications::{MarketDataEvent, OrderUpdate};

use super::{DiagnosticEvent, DispatchItem};

/// Runs until `dispatch_rx` disconnects (every `Sender` clone was dropped),
/// at which point it exits cleanly.
///
/// A panic inside one instrument's `submit` (an invariant violation) is
/// caught here rather than allowed to kill the thread: the owning
/// instrument is marked halted and stops processing further orders, but
/// every other instrument keeps going. This bounds the blast radius of a
/// single matching-engine bug to the one instrument it occurred on, per the
/// fatal/halt semantics the engine promises for `INVARIANT_VIOLATION`.
///
/// Cancellations are interleaved on the same queue as submissions (see
/// [`DispatchItem`]) and handled inline here rather than by a separate
/// thread, so that this remains the only thread that ever mutates an
/// instrument's book sides.
pub fn run(
    dispatch_rx: Receiver<DispatchItem>,
    instruments: Arc<DashMap<String, Arc<Instrument>>>,
    order_update_tx: Sender<OrderUpdate>,
    market_data_tx: Sender<MarketDataEvent>,
    halted: Arc<DashSet<String>>,
    diagnostics_tx: Sender<DiagnosticEvent>,
) {
    info!("dispatcher started");
    for item in dispatch_rx.iter() {
        match item {
            DispatchItem::Submit(submitted) => {
                if halted.contains(&submitted.ticker) {
                    warn!(ticker = %submitted.ticker, "dropping order, instrument halted");
                    continue;
                }
                let Some(instrument) = instruments.get(&submitted.ticker).map(|e| e.value().clone()) else {
                    error!(ticker = %submitted.ticker, "submitted order for unregistered ticker");
                    continue;
                };
                let order = submitted.order;
                let order_update_tx = order_update_tx.clone();
                let market_data_tx = market_data_tx.clone();
                let result = catch_unwind(AssertUnwindSafe(|| {
                    instrument.submit(order, &order_update_tx, &market_data_tx);
                }));
                if let Err(panic) = result {
                    let message = panic_message(&panic);
                    error!(ticker = %submitted.ticker, message = %message, "instrument halted after invariant violation");
                    halted.insert(submitted.ticker.clone());
                    let _ = diagnostics_tx.send(DiagnosticEvent {
                        ticker: submitted.ticker,
                        message,
                    });
                }
            }
            DispatchItem::Cancel(request) => {
                if halted.contains(&request.ticker) {
                    warn!(ticker = %request.ticker, "dropping cancel, instrument halted");
                    let _ = request.reply.send(None);
                    continue;
                }
                let Some(instrument) = instruments.get(&request.ticker).map(|e| e.value().clone()) else {
                    let _ = request.reply.send(None);
                    continue;
                };
                let cancelled = instrument.cancel(request.client_id, request.order_id, &order_update_tx);
                let _ = request.reply.send(cancelled);
            }
        }
    }
    info!("dispatcher stopped");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
