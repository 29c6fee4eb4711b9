//! Exchange configuration.

/// Tunables for [`crate::ExchangeFacade::new`].
///
/// Constructed programmatically; there is no environment-variable or file
/// surface here, since the bootstrap/CLI that would own one is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Capacity of each of the three internal bounded queues (submitted
    /// orders, order updates, market data). A producer blocks once a queue
    /// is at capacity rather than dropping work.
    pub queue_capacity: usize,
    /// Capacity of the diagnostics channel used to surface invariant
    /// violations without depending on anyone draining it promptly.
    pub diagnostics_capacity: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100_000,
            diagnostics_capacity: 1_024,
        }
    }
}
