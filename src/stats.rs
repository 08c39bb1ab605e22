use crate::worker::WorkerState;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared between producers and the flush worker.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    appended: AtomicU64,
    filtered: AtomicU64,
    enqueued: AtomicU64,
    persisted: AtomicU64,
    failed_writes: AtomicU64,
    restarts: AtomicU64,
}

impl Counters {
    pub fn appended(&self) {
        self.appended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed_write(&self) {
        self.failed_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn restarted(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of the sink's counters.
///
/// `persisted` and `failed_writes` include synthetic diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkStats {
    /// Events passed to `append`, before filtering.
    pub appended: u64,
    /// Rejected by the level threshold or the user filter, or appended
    /// after close.
    pub filtered: u64,
    /// Accepted into the ring buffer.
    pub enqueued: u64,
    /// Evicted by the drop-oldest policy.
    pub dropped: u64,
    pub persisted: u64,
    pub failed_writes: u64,
    /// Times the flush worker was restarted after a fault.
    pub restarts: u64,
    /// Events currently waiting in the buffer.
    pub buffered: usize,
    pub worker: WorkerState,
}

impl Counters {
    pub fn snapshot(&self, dropped: u64, buffered: usize, worker: WorkerState) -> SinkStats {
        SinkStats {
            appended: self.appended.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped,
            persisted: self.persisted.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            buffered,
            worker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let counters = Counters::default();
        counters.appended();
        counters.appended();
        counters.filtered();
        counters.enqueued();
        counters.persisted();
        counters.failed_write();
        counters.restarted();

        let snap = counters.snapshot(4, 2, WorkerState::Running);
        assert_eq!(snap.appended, 2);
        assert_eq!(snap.filtered, 1);
        assert_eq!(snap.enqueued, 1);
        assert_eq!(snap.dropped, 4);
        assert_eq!(snap.persisted, 1);
        assert_eq!(snap.failed_writes, 1);
        assert_eq!(snap.restarts, 1);
        assert_eq!(snap.buffered, 2);
        assert_eq!(snap.worker, WorkerState::Running);
    }
}
