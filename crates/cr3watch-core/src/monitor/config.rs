use std::time::Duration;

use crate::CtrlRegMonitor;

/// Tunables of a monitor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    poll_timeout: Duration,
    sync: bool,
    onchange_only: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Self::DEFAULT_POLL_TIMEOUT,
            sync: true,
            onchange_only: true,
        }
    }
}

impl MonitorConfig {
    /// Default upper bound of a single wait for a notification.
    pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(200);

    /// Sets how long the dispatch loop waits for a notification before it
    /// re-checks the stop flag.
    ///
    /// This is the worst-case latency between a stop request and the loop
    /// returning.
    pub fn with_poll_timeout(self, poll_timeout: Duration) -> Self {
        Self {
            poll_timeout,
            ..self
        }
    }

    /// Sets whether the vCPU is paused until each event is answered.
    pub fn with_sync(self, sync: bool) -> Self {
        Self { sync, ..self }
    }

    /// Sets whether writes that leave CR3 unchanged are suppressed.
    pub fn with_onchange_only(self, onchange_only: bool) -> Self {
        Self {
            onchange_only,
            ..self
        }
    }

    /// Returns the wait timeout of the dispatch loop.
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Returns `true` if interception is synchronous.
    pub fn sync(&self) -> bool {
        self.sync
    }

    /// Returns `true` if no-op writes are suppressed.
    pub fn onchange_only(&self) -> bool {
        self.onchange_only
    }

    /// Returns the interception options that enable monitoring.
    pub(crate) fn ctrlreg(&self) -> CtrlRegMonitor {
        CtrlRegMonitor {
            enable: true,
            sync: self.sync,
            bitmask: 0,
            onchange_only: self.onchange_only,
        }
    }
}
