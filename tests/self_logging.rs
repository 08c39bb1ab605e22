use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use ring_log_sink::document::LogDocument;
use ring_log_sink::init::{init_tracing_with_config, LayerConfig};
use ring_log_sink::memory_store::MemoryStore;
use ring_log_sink::store::{BoxError, DocumentStore};

/// Logs through `tracing` on every insert, the way an HTTP client does
/// while a backend talks to its server.
struct ChattyStore {
    inner: MemoryStore,
}

#[async_trait]
impl DocumentStore for ChattyStore {
    async fn insert(&self, doc: &LogDocument) -> Result<(), BoxError> {
        tracing::info!(target: "hyper::client::conn", "connecting to store");
        tokio::task::yield_now().await;
        tracing::warn!(target: "reqwest::connect", bytes = doc.message.len(), "slow response");
        self.inner.insert(doc).await
    }
}

// Installs a global subscriber, so this binary holds a single test.
#[test]
fn store_side_logging_is_not_fed_back_into_the_sink() {
    let memory = MemoryStore::new();
    let config = LayerConfig {
        enable_stdout: false,
        ..LayerConfig::default()
    };
    let sink = init_tracing_with_config(Arc::new(ChattyStore { inner: memory.clone() }), config).unwrap();

    tracing::error!(target: "orders", "order failed");

    let deadline = Instant::now() + Duration::from_secs(5);
    while memory.is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    // Anything fed back would show up within a few flush cycles.
    std::thread::sleep(Duration::from_millis(200));
    sink.close();

    assert_eq!(memory.messages(), vec!["order failed"]);
    let stats = sink.stats();
    assert_eq!(stats.appended, 1);
    assert_eq!(stats.persisted, 1);
}
