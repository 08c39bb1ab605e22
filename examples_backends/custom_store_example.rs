use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use ring_log_sink::{
    document::LogDocument,
    init::init_tracing,
    store::{BoxError, DocumentStore},
};

/// Example of integrating a completely custom backend by implementing
/// the `DocumentStore` trait directly. Imagine this talks to some
/// proprietary DB for which this crate does not provide a built-in
/// store.
struct MyCustomDbStore;

#[async_trait]
impl DocumentStore for MyCustomDbStore {
    async fn insert(&self, doc: &LogDocument) -> Result<(), BoxError> {
        // Here you would call your own client library for the target DB.
        // For the sake of example we just print the document.
        println!("[my-custom-db] {}", serde_json::to_string(doc)?);
        Ok(())
    }
}

fn main() {
    let store: Arc<dyn DocumentStore> = Arc::new(MyCustomDbStore);

    let sink = init_tracing(store).expect("install tracing");

    info!("custom backend example started");
    error!(db = "my-custom-db", "simulated error sent via custom backend");

    sink.close();
}
