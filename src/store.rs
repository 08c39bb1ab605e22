use crate::document::LogDocument;
use async_trait::async_trait;
use std::error::Error;

/// Error type returned by store implementations.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Remote destination for [`LogDocument`]s.
///
/// The flush worker calls `insert` once per event from its own runtime
/// and never on an application thread. Failures are counted and
/// discarded by the caller: implementations should not retry internally.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a single document.
    ///
    /// **Returns**
    /// - `Ok(())` if the store accepted the document.
    /// - `Err(..)` on any transport, serialization or rejection error.
    async fn insert(&self, doc: &LogDocument) -> Result<(), BoxError>;
}
