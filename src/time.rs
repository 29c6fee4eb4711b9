//! Monotonic timestamp helpers.
//!
//! Entry-time tie-breaks in [`crate::book::OrderBookSide`] depend on
//! `next_entry_time_ns` never returning the same value twice, even when two
//! requests land within the same OS clock tick.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static START: OnceLock<Instant> = OnceLock::new();
static LAST_ENTRY_TIME: AtomicU64 = AtomicU64::new(0);

/// Strictly increasing nanosecond counter, process-wide.
///
/// Built from [`Instant::elapsed`] but bumped past the last value handed out
/// so that two calls in quick succession never tie, regardless of clock
/// resolution.
pub fn next_entry_time_ns() -> u64 {
    let start = *START.get_or_init(Instant::now);
    let observed = start.elapsed().as_nanos() as u64;
    let mut last = LAST_ENTRY_TIME.load(Ordering::Relaxed);
    loop {
        let next = observed.max(last + 1);
        match LAST_ENTRY_TIME.compare_exchange_weak(
            last,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch, used for notification
/// timestamps (spec requires milliseconds on the wire, nanoseconds
/// internally for tie-breaks).
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
