//! Background flush worker.
//!
//! The worker drains the ring buffer and writes one document per event.
//! Its main loop runs as a spawned task under a supervisor: a panic
//! anywhere in the loop (a misbehaving store, a filter, the transform)
//! surfaces as a `JoinError`, is persisted as an "Appender exception"
//! diagnostic and the loop is started again. Restarts never stop; only
//! rapid consecutive faults are spaced out with exponential backoff.
//!
//! ```text
//! Running ──fault──► Running (restart)
//!    │
//!  shutdown
//!    ▼
//! Draining ──empty / force stop──► Stopped
//! ```

use crate::config::SinkConfig;
use crate::diagnostics;
use crate::document::LogDocument;
use crate::overflow::OverflowTracker;
use crate::record::LogEvent;
use crate::ring::RingBuffer;
use crate::stats::Counters;
use crate::store::DocumentStore;
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tokio::time::sleep;

/// Observable phase of the flush worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => WorkerState::Running,
            2 => WorkerState::Draining,
            3 => WorkerState::Stopped,
            _ => WorkerState::Starting,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Starting => 0,
            WorkerState::Running => 1,
            WorkerState::Draining => 2,
            WorkerState::Stopped => 3,
        }
    }
}

thread_local! {
    static SINK_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is doing the sink's own work.
///
/// True on every thread of the flush runtime and while a store insert is
/// being polled anywhere. Events emitted there (HTTP client chatter, store
/// drivers) must not be fed back into the sink.
pub fn is_sink_thread() -> bool {
    SINK_THREAD.with(|flag| flag.get())
}

/// Mark the current thread as sink-owned for its whole lifetime.
pub(crate) fn mark_sink_thread() {
    SINK_THREAD.with(|flag| flag.set(true));
}

/// Polls the inner future with the sink-thread flag raised.
struct SinkScoped<F>(F);

impl<F: Future + Unpin> Future for SinkScoped<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        struct Restore(bool);
        impl Drop for Restore {
            fn drop(&mut self) {
                let prev = self.0;
                SINK_THREAD.with(|flag| flag.set(prev));
            }
        }

        let _restore = Restore(SINK_THREAD.with(|flag| flag.replace(true)));
        Pin::new(&mut self.0).poll(cx)
    }
}

/// Flags coordinating the shutdown protocol between `close` and the
/// worker.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    shutting_down: AtomicBool,
    force_stop: AtomicBool,
    state: AtomicU8,
    finished: Mutex<bool>,
    finished_signal: Condvar,
}

impl Lifecycle {
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn force_stop(&self) {
        self.force_stop.store(true, Ordering::SeqCst);
    }

    pub fn is_force_stopped(&self) -> bool {
        self.force_stop.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn finish(&self) {
        self.set_state(WorkerState::Stopped);
        let mut finished = self.finished.lock();
        *finished = true;
        self.finished_signal.notify_all();
    }

    /// Block the calling thread until the worker has drained or `timeout`
    /// elapses. Returns whether the worker finished.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let mut finished = self.finished.lock();
        if !*finished {
            self.finished_signal
                .wait_while_for(&mut finished, |done| !*done, timeout);
        }
        *finished
    }
}

/// State shared by the sink facade and the worker.
pub(crate) struct Shared {
    pub ring: RingBuffer<LogEvent>,
    pub tracker: Arc<OverflowTracker>,
    pub store: Arc<dyn DocumentStore>,
    pub lifecycle: Lifecycle,
    pub counters: Counters,
    pub config: SinkConfig,
}

/// Supervise the flush loop until shutdown, then drain and signal
/// completion.
pub(crate) async fn supervise(shared: Arc<Shared>) {
    let mut delay: Option<Duration> = None;

    loop {
        shared.lifecycle.set_state(WorkerState::Running);
        let started = Instant::now();
        let err = match tokio::spawn(run_loop(Arc::clone(&shared))).await {
            Ok(()) => break,
            Err(err) => err,
        };

        shared.counters.restarted();
        report_fault(&shared, "flush loop terminated unexpectedly", err).await;
        if shared.lifecycle.is_shutting_down() {
            break;
        }

        // A loop that stayed up long enough counts as healthy again.
        if started.elapsed() >= shared.config.max_restart_backoff {
            delay = None;
        }
        match delay {
            None => delay = Some(shared.config.restart_backoff),
            Some(current) => {
                tracing::debug!(backoff = ?current, "flush loop faulting repeatedly, delaying restart");
                sleep_unless_shutdown(&shared, current).await;
                delay = Some(std::cmp::min(current * 2, shared.config.max_restart_backoff));
            }
        }
    }

    shared.lifecycle.set_state(WorkerState::Draining);
    while let Err(err) = tokio::spawn(drain(Arc::clone(&shared))).await {
        report_fault(&shared, "buffer drain terminated unexpectedly", err).await;
    }
    // Overflows since the last loop iteration would otherwise go unreported.
    if !shared.lifecycle.is_force_stopped() {
        if let Some(report) = shared.tracker.take_report() {
            persist_isolated(&shared, diagnostics::buffer_overflow(&report)).await;
        }
    }
    shared.lifecycle.finish();
    tracing::debug!("log flush worker stopped");
}

async fn run_loop(shared: Arc<Shared>) {
    while !shared.lifecycle.is_shutting_down() {
        if let Some(report) = shared.tracker.take_report() {
            persist_isolated(&shared, diagnostics::buffer_overflow(&report)).await;
        }

        match shared.ring.try_dequeue() {
            Some(event) => persist(&shared, &event).await,
            None => shared.ring.wait(shared.config.poll_interval).await,
        }
    }
}

/// Empty the buffer after shutdown was requested.
///
/// Force-stop is checked before each dequeue, so an event that has left
/// the buffer is always written.
async fn drain(shared: Arc<Shared>) {
    while !shared.lifecycle.is_force_stopped() {
        let Some(event) = shared.ring.try_dequeue() else {
            break;
        };
        persist(&shared, &event).await;
    }
}

/// Best-effort single insert. Failures are counted and discarded; they
/// are never retried and never re-enter the buffer.
pub(crate) async fn persist(shared: &Shared, event: &LogEvent) {
    let doc = LogDocument::from(event);
    match SinkScoped(shared.store.insert(&doc)).await {
        Ok(()) => shared.counters.persisted(),
        Err(e) => {
            shared.counters.failed_write();
            tracing::trace!(error = %e, "discarding failed log insert");
        }
    }
}

/// Like [`persist`], but a panicking store cannot take down the caller.
pub(crate) async fn persist_isolated(shared: &Arc<Shared>, event: LogEvent) {
    let task_shared = Arc::clone(shared);
    let write = tokio::spawn(async move { persist(&task_shared, &event).await });
    if let Err(err) = write.await {
        shared.counters.failed_write();
        tracing::trace!(error = %err, "diagnostic write panicked");
    }
}

async fn report_fault(shared: &Arc<Shared>, context: &str, err: JoinError) {
    let detail = fault_detail(err);
    tracing::warn!(context, detail = %detail, "log flush worker faulted");
    persist_isolated(shared, diagnostics::appender_exception(context, &detail)).await;
}

fn fault_detail(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

async fn sleep_unless_shutdown(shared: &Shared, total: Duration) {
    let deadline = Instant::now() + total;
    while !shared.lifecycle.is_shutting_down() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        sleep(remaining.min(shared.config.poll_interval)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::store::BoxError;
    use async_trait::async_trait;
    use tracing::Level;

    fn shared_with(store: Arc<dyn DocumentStore>, capacity: usize) -> Arc<Shared> {
        let config = SinkConfig::default().with_capacity(capacity).normalized();
        let tracker = Arc::new(OverflowTracker::new(config.capacity, config.overflow_report_window));
        let hook = Arc::clone(&tracker);
        Arc::new(Shared {
            ring: RingBuffer::new(config.capacity, Box::new(move || hook.record_overflow())),
            tracker,
            store,
            lifecycle: Lifecycle::default(),
            counters: Counters::default(),
            config,
        })
    }

    fn event(msg: &str) -> LogEvent {
        LogEvent::new(Level::INFO, "test", msg)
    }

    struct PanicOn(&'static str, MemoryStore);

    #[async_trait]
    impl DocumentStore for PanicOn {
        async fn insert(&self, doc: &LogDocument) -> Result<(), BoxError> {
            if doc.message == self.0 {
                panic!("store exploded on {}", doc.message);
            }
            self.1.insert(doc).await
        }
    }

    #[tokio::test]
    async fn drain_writes_everything_then_finishes() {
        let store = MemoryStore::new();
        let shared = shared_with(Arc::new(store.clone()), 8);
        for m in ["a", "b", "c"] {
            shared.ring.enqueue(event(m));
        }
        shared.lifecycle.begin_shutdown();

        supervise(Arc::clone(&shared)).await;

        assert_eq!(store.messages(), vec!["a", "b", "c"]);
        assert_eq!(shared.lifecycle.state(), WorkerState::Stopped);
        assert!(shared.lifecycle.wait_finished(Duration::ZERO));
    }

    #[tokio::test]
    async fn force_stop_abandons_remaining_events() {
        let store = MemoryStore::new();
        let shared = shared_with(Arc::new(store.clone()), 8);
        shared.ring.enqueue(event("left behind"));
        shared.lifecycle.begin_shutdown();
        shared.lifecycle.force_stop();

        supervise(Arc::clone(&shared)).await;

        assert!(store.is_empty());
        assert_eq!(shared.ring.len(), 1);
    }

    #[tokio::test]
    async fn failed_inserts_are_counted_not_retried() {
        let store = MemoryStore::new();
        store.fail_next(1);
        let shared = shared_with(Arc::new(store.clone()), 8);
        shared.ring.enqueue(event("lost"));
        shared.ring.enqueue(event("kept"));
        shared.lifecycle.begin_shutdown();

        supervise(Arc::clone(&shared)).await;

        assert_eq!(store.messages(), vec!["kept"]);
        let snap = shared.counters.snapshot(0, 0, shared.lifecycle.state());
        assert_eq!(snap.failed_writes, 1);
        assert_eq!(snap.persisted, 1);
    }

    #[tokio::test]
    async fn panicking_drain_is_reported_and_resumed() {
        let memory = MemoryStore::new();
        let shared = shared_with(Arc::new(PanicOn("bad", memory.clone())), 8);
        for m in ["ok-1", "bad", "ok-2"] {
            shared.ring.enqueue(event(m));
        }
        shared.lifecycle.begin_shutdown();

        supervise(Arc::clone(&shared)).await;

        let messages = memory.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], "ok-1");
        assert!(messages[1].starts_with(diagnostics::APPENDER_EXCEPTION_PREFIX));
        assert_eq!(messages[2], "ok-2");
        let docs = memory.documents();
        let detail = docs[1].exception.as_ref().map(|e| e.message.clone());
        assert_eq!(detail.as_deref(), Some("store exploded on bad"));
    }

    struct FlagRecorder(Arc<AtomicBool>);

    #[async_trait]
    impl DocumentStore for FlagRecorder {
        async fn insert(&self, _doc: &LogDocument) -> Result<(), BoxError> {
            tokio::task::yield_now().await;
            self.0.store(is_sink_thread(), Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn store_inserts_run_flagged_as_sink_work() {
        let seen = Arc::new(AtomicBool::new(false));
        let shared = shared_with(Arc::new(FlagRecorder(Arc::clone(&seen))), 4);

        assert!(!is_sink_thread());
        persist(&shared, &event("x")).await;

        assert!(seen.load(Ordering::SeqCst));
        assert!(!is_sink_thread());
    }

    #[test]
    fn finish_signal_wakes_waiter() {
        let lifecycle = Arc::new(Lifecycle::default());
        assert!(!lifecycle.wait_finished(Duration::from_millis(5)));

        let remote = Arc::clone(&lifecycle);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.finish();
        });
        assert!(lifecycle.wait_finished(Duration::from_secs(5)));
        handle.join().unwrap();
        assert_eq!(lifecycle.state(), WorkerState::Stopped);
    }
}
