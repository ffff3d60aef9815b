use std::time::{Duration, Instant};

/// Counters maintained by the dispatch loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStats {
    /// Notifications received.
    pub wakeups: u64,

    /// Ring requests answered.
    pub requests: u64,

    /// Requests that were CR3 writes and reached the handler.
    pub cr3_events: u64,

    /// Waits that elapsed without a notification.
    pub timeouts: u64,

    /// Time spent draining the ring, handler included.
    pub processing_overhead: Duration,
}

/// Adds the time between its creation and its drop to a duration.
pub(crate) struct OverheadGuard<'a> {
    overhead: &'a mut Duration,
    start: Instant,
}

impl<'a> OverheadGuard<'a> {
    pub fn new(overhead: &'a mut Duration) -> Self {
        Self {
            overhead,
            start: Instant::now(),
        }
    }
}

impl Drop for OverheadGuard<'_> {
    fn drop(&mut self) {
        *self.overhead += self.start.elapsed();
    }
}
