use crate::config::SinkConfig;
use crate::diagnostics;
use crate::overflow::OverflowTracker;
use crate::record::LogEvent;
use crate::ring::RingBuffer;
use crate::stats::{Counters, SinkStats};
use crate::store::DocumentStore;
use crate::worker::{self, Lifecycle, Shared, WorkerState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use tokio::runtime::Runtime;

/// Error returned when the sink cannot be started.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("failed to build flush worker runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Non-blocking log sink.
///
/// Producers call [`append`](Self::append) from any thread; events land
/// in a drop-oldest ring buffer and a dedicated worker writes them to the
/// [`DocumentStore`] one at a time. Nothing on the producer path touches
/// I/O, and no store failure is ever surfaced to a producer.
///
/// Call [`close`](Self::close) (or drop the sink) to drain the buffer.
/// Closing waits at most `shutdown_timeout`; anything still buffered after
/// that is abandoned and a forced-shutdown diagnostic is written instead.
pub struct RingSink {
    shared: Arc<Shared>,
    runtime: Mutex<Option<Runtime>>,
    closed: AtomicBool,
}

impl RingSink {
    /// Allocate the buffer, wire overflow counting into the tracker and
    /// launch the supervised flush worker on its own runtime thread.
    ///
    /// May be called from inside an async context.
    pub fn start(config: SinkConfig, store: Arc<dyn DocumentStore>) -> Result<Self, SinkError> {
        let config = config.normalized();

        let tracker = Arc::new(OverflowTracker::new(config.capacity, config.overflow_report_window));
        let overflow_hook = Arc::clone(&tracker);
        let ring = RingBuffer::new(
            config.capacity,
            Box::new(move || overflow_hook.record_overflow()),
        );

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("ring-log-flush")
            .on_thread_start(worker::mark_sink_thread)
            .enable_all()
            .build()?;

        let shared = Arc::new(Shared {
            ring,
            tracker,
            store,
            lifecycle: Lifecycle::default(),
            counters: Counters::default(),
            config,
        });

        runtime.spawn(worker::supervise(Arc::clone(&shared)));
        tracing::debug!(capacity = shared.config.capacity, "log sink started");

        Ok(RingSink {
            shared,
            runtime: Mutex::new(Some(runtime)),
            closed: AtomicBool::new(false),
        })
    }

    /// Filter and enqueue a single event. Never blocks on I/O and never
    /// fails; events appended after [`close`](Self::close) are discarded.
    pub fn append(&self, event: LogEvent) {
        self.shared.counters.appended();
        if self.closed.load(Ordering::SeqCst) || !self.shared.config.accepts(&event) {
            self.shared.counters.filtered();
            return;
        }
        self.shared.ring.enqueue(event);
        self.shared.counters.enqueued();
    }

    pub fn append_all<I>(&self, events: I)
    where
        I: IntoIterator<Item = LogEvent>,
    {
        for event in events {
            self.append(event);
        }
    }

    /// Write `event` straight to the store, bypassing the buffer.
    ///
    /// Best-effort and bounded by `diagnostic_timeout`: failures and
    /// panics in the store are swallowed. Blocks the calling thread for at
    /// most that long, so keep it off hot paths.
    pub fn persist(&self, event: LogEvent) {
        if self.runtime.lock().is_none() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let timeout = shared.config.diagnostic_timeout;
        let (done_tx, done_rx) = mpsc::channel();

        // A detached thread with its own runtime: the flush runtime may be
        // wedged by the very store we are writing to, and the caller may
        // itself be inside a runtime. The thread is left behind if the
        // store never returns.
        let spawned = std::thread::Builder::new()
            .name("ring-log-direct".to_string())
            .spawn(move || {
                worker::mark_sink_thread();
                match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime.block_on(worker::persist_isolated(&shared, event)),
                    Err(e) => {
                        shared.counters.failed_write();
                        tracing::trace!(error = %e, "cannot build runtime for direct log write");
                    }
                }
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(_) => {
                if done_rx.recv_timeout(timeout).is_err() {
                    self.shared.counters.failed_write();
                }
            }
            Err(e) => {
                self.shared.counters.failed_write();
                tracing::trace!(error = %e, "cannot spawn direct log write");
            }
        }
    }

    /// Shut the sink down.
    ///
    /// Signals the worker, waits up to `shutdown_timeout` for it to drain
    /// the buffer, and forces a stop otherwise. Always returns; calling it
    /// more than once is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let lifecycle = &self.shared.lifecycle;
        lifecycle.begin_shutdown();
        self.shared.ring.wake();

        if !lifecycle.wait_finished(self.shared.config.shutdown_timeout) {
            lifecycle.force_stop();
            tracing::warn!(
                buffered = self.shared.ring.len(),
                timeout = ?self.shared.config.shutdown_timeout,
                "log sink did not drain in time, forcing shutdown"
            );
            self.persist(diagnostics::forced_shutdown());
        }

        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
        tracing::debug!("log sink closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SinkConfig {
        &self.shared.config
    }

    pub fn worker_state(&self) -> WorkerState {
        self.shared.lifecycle.state()
    }

    pub fn stats(&self) -> SinkStats {
        self.shared.counters.snapshot(
            self.shared.tracker.total_dropped(),
            self.shared.ring.len(),
            self.shared.lifecycle.state(),
        )
    }
}

impl Drop for RingSink {
    fn drop(&mut self) {
        self.close();
    }
}
