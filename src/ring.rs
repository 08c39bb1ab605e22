use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Invoked once for every item evicted by the drop-oldest policy.
///
/// The callback receives no payload: it is a counting signal, not a way
/// to recover the dropped item.
pub type OverflowCallback = Box<dyn Fn() + Send + Sync>;

/// Fixed-capacity circular buffer with drop-oldest overflow.
///
/// Any number of producers may [`enqueue`](Self::enqueue) concurrently;
/// a single consumer drains it with [`try_dequeue`](Self::try_dequeue)
/// and parks in [`wait`](Self::wait) when empty. Every cursor and flag
/// mutation happens under one lock, and there is no unlocked emptiness
/// pre-check.
pub struct RingBuffer<T> {
    state: Mutex<Slots<T>>,
    capacity: usize,
    on_overflow: OverflowCallback,
    ready: Notify,
}

struct Slots<T> {
    items: Box<[Option<T>]>,
    read: usize,
    write: usize,
    /// Set iff `read == write` and the slots between them are all live.
    full: bool,
}

impl<T> RingBuffer<T> {
    /// Allocate a buffer holding at most `capacity` items (clamped to at
    /// least one).
    pub fn new(capacity: usize, on_overflow: OverflowCallback) -> Self {
        let capacity = capacity.max(1);
        let items = (0..capacity).map(|_| None).collect::<Vec<_>>().into_boxed_slice();
        RingBuffer {
            state: Mutex::new(Slots {
                items,
                read: 0,
                write: 0,
                full: false,
            }),
            capacity,
            on_overflow,
            ready: Notify::new(),
        }
    }

    /// Store `item`, evicting the oldest unread item if the buffer is full.
    ///
    /// Never blocks beyond the internal critical section.
    pub fn enqueue(&self, item: T) {
        let overflowed = {
            let mut slots = self.state.lock();
            let write = slots.write;
            slots.items[write] = Some(item);
            slots.write = (write + 1) % self.capacity;
            if slots.full {
                // The slot just written held the next item to read.
                slots.read = slots.write;
                true
            } else {
                slots.full = slots.write == slots.read;
                false
            }
        };

        if overflowed {
            (self.on_overflow)();
        }
        self.ready.notify_one();
    }

    /// Take the oldest unread item, or `None` if the buffer is empty.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut slots = self.state.lock();
        if slots.read == slots.write && !slots.full {
            return None;
        }
        let read = slots.read;
        let item = slots.items[read].take();
        slots.read = (read + 1) % self.capacity;
        slots.full = false;
        item
    }

    /// Park until an item is enqueued, [`wake`](Self::wake) is called, or
    /// `timeout` elapses. A wakeup issued while nobody waits is kept for
    /// the next call.
    pub async fn wait(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.ready.notified()).await;
    }

    /// Release a consumer parked in [`wait`](Self::wait).
    pub fn wake(&self) {
        self.ready.notify_one();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live items currently buffered.
    pub fn len(&self) -> usize {
        let slots = self.state.lock();
        if slots.full {
            self.capacity
        } else {
            (slots.write + self.capacity - slots.read) % self.capacity
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn counting(capacity: usize) -> (RingBuffer<String>, Arc<AtomicUsize>) {
        let overflows = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&overflows);
        let ring = RingBuffer::new(
            capacity,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (ring, overflows)
    }

    fn drain(ring: &RingBuffer<String>) -> Vec<String> {
        std::iter::from_fn(|| ring.try_dequeue()).collect()
    }

    #[test]
    fn drop_oldest_keeps_most_recent_items() {
        let (ring, overflows) = counting(3);
        for item in ["A", "B", "C", "D"] {
            ring.enqueue(item.to_string());
        }

        assert_eq!(drain(&ring), vec!["B", "C", "D"]);
        assert_eq!(overflows.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dequeue_on_empty_returns_none() {
        let (ring, _) = counting(2);
        assert_eq!(ring.try_dequeue(), None);

        ring.enqueue("A".to_string());
        assert_eq!(ring.try_dequeue().as_deref(), Some("A"));
        assert_eq!(ring.try_dequeue(), None);
    }

    #[test]
    fn preserves_fifo_across_wraparound() {
        let (ring, overflows) = counting(4);
        let mut expected = Vec::new();
        let mut seen = Vec::new();
        for round in 0..10 {
            for i in 0..3 {
                let item = format!("{round}-{i}");
                expected.push(item.clone());
                ring.enqueue(item);
            }
            seen.extend(drain(&ring));
        }

        assert_eq!(seen, expected);
        assert_eq!(overflows.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn never_holds_more_than_capacity() {
        let (ring, overflows) = counting(5);
        for i in 0..23 {
            ring.enqueue(i.to_string());
            assert!(ring.len() <= ring.capacity());
        }

        assert_eq!(ring.len(), 5);
        assert_eq!(overflows.load(Ordering::SeqCst), 18);
        assert_eq!(drain(&ring), vec!["18", "19", "20", "21", "22"]);
        assert!(ring.is_empty());
    }

    #[test]
    fn full_then_partial_drain_then_refill() {
        let (ring, overflows) = counting(2);
        ring.enqueue("A".into());
        ring.enqueue("B".into());
        assert_eq!(ring.len(), 2);

        assert_eq!(ring.try_dequeue().as_deref(), Some("A"));
        ring.enqueue("C".into());
        assert_eq!(overflows.load(Ordering::SeqCst), 0);
        assert_eq!(drain(&ring), vec!["B", "C"]);
    }

    #[test]
    fn concurrent_producers_without_overflow() {
        let (ring, overflows) = counting(1000);
        std::thread::scope(|scope| {
            for i in 0..100 {
                let ring = &ring;
                scope.spawn(move || ring.enqueue(format!("p{i}")));
            }
        });

        let mut items = drain(&ring);
        items.sort();
        let mut expected: Vec<String> = (0..100).map(|i| format!("p{i}")).collect();
        expected.sort();
        assert_eq!(items, expected);
        assert_eq!(overflows.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (ring, overflows) = counting(0);
        assert_eq!(ring.capacity(), 1);
        ring.enqueue("A".into());
        ring.enqueue("B".into());
        assert_eq!(drain(&ring), vec!["B"]);
        assert_eq!(overflows.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_returns_early_on_enqueue() {
        let (ring, _) = counting(4);
        let ring = Arc::new(ring);
        let producer = Arc::clone(&ring);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue("late".into());
        });

        let start = Instant::now();
        ring.wait(Duration::from_secs(5)).await;
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(ring.try_dequeue().as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn wait_times_out_when_idle() {
        let (ring, _) = counting(4);
        let start = Instant::now();
        ring.wait(Duration::from_millis(30)).await;
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
