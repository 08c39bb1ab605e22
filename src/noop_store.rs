use crate::document::LogDocument;
use crate::store::{BoxError, DocumentStore};
use async_trait::async_trait;

/// A store that simply drops all documents.
///
/// Useful for measuring the overhead of the sink itself without any
/// external I/O.
#[derive(Clone, Default)]
pub struct NoopStore;

#[async_trait]
impl DocumentStore for NoopStore {
    async fn insert(&self, _doc: &LogDocument) -> Result<(), BoxError> {
        Ok(())
    }
}
