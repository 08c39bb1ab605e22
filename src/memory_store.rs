use crate::document::LogDocument;
use crate::store::{BoxError, DocumentStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-process store that keeps every inserted document.
///
/// Cloning shares the underlying collection. `fail_next` makes the next
/// `n` inserts fail, which is how tests exercise the sink's discard path.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<Vec<LogDocument>>>,
    failures: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything inserted so far, in insertion order.
    pub fn documents(&self) -> Vec<LogDocument> {
        self.docs.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.docs.lock().iter().map(|d| d.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.lock().is_empty()
    }

    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, doc: &LogDocument) -> Result<(), BoxError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err("memory store: injected insert failure".into());
        }
        self.docs.lock().push(doc.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogEvent;
    use tracing::Level;

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = MemoryStore::new();
        store.fail_next(1);
        let doc = LogDocument::from(&LogEvent::new(Level::INFO, "t", "one"));

        assert!(store.insert(&doc).await.is_err());
        assert!(store.insert(&doc).await.is_ok());
        assert_eq!(store.messages(), vec!["one"]);
    }
}
