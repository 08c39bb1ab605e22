use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Summary of events lost to the drop-oldest policy since the previous
/// report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowReport {
    pub dropped: u64,
    pub capacity: usize,
    pub window: Duration,
}

/// Counts evicted events and throttles overflow reporting to at most one
/// report per `window`, so an overflow storm cannot flood the store with
/// its own diagnostics.
#[derive(Debug)]
pub struct OverflowTracker {
    pending: AtomicU64,
    total: AtomicU64,
    last_report: Mutex<Option<Instant>>,
    capacity: usize,
    window: Duration,
}

impl OverflowTracker {
    pub fn new(capacity: usize, window: Duration) -> Self {
        OverflowTracker {
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
            last_report: Mutex::new(None),
            capacity,
            window,
        }
    }

    /// Called from the buffer's overflow callback, on producer threads.
    pub fn record_overflow(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether a report would fire right now.
    #[cfg(test)]
    pub(crate) fn should_report(&self) -> bool {
        self.pending.load(Ordering::Relaxed) > 0 && self.window_elapsed(*self.last_report.lock(), Instant::now())
    }

    /// Emit a report if drops are pending and none was reported within the
    /// window. Firing resets the pending count and restarts the window.
    pub fn take_report(&self) -> Option<OverflowReport> {
        let now = Instant::now();
        let mut last_report = self.last_report.lock();
        if !self.window_elapsed(*last_report, now) || self.pending.load(Ordering::Relaxed) == 0 {
            return None;
        }
        let dropped = self.pending.swap(0, Ordering::Relaxed);
        *last_report = Some(now);
        Some(OverflowReport {
            dropped,
            capacity: self.capacity,
            window: self.window,
        })
    }

    /// Drops counted since the last report.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Drops counted over the tracker's lifetime.
    pub fn total_dropped(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn window_elapsed(&self, last_report: Option<Instant>, now: Instant) -> bool {
        match last_report {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.window,
        }
    }
}
