use crate::document::LogDocument;
use crate::store::{BoxError, DocumentStore};
use async_trait::async_trait;
use reqwest::Client;

/// OpenSearch store that indexes each log document with a single
/// `_doc` request.
#[derive(Clone)]
pub struct OpenSearchStore {
    client: Client,
    /// Base URL of the OpenSearch cluster, e.g. "http://localhost:9200".
    base_url: String,
    /// Target index name.
    index: String,
}

impl OpenSearchStore {
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Self {
        OpenSearchStore {
            client: Client::new(),
            base_url: base_url.into(),
            index: index.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}/_doc", self.base_url.trim_end_matches('/'), self.index)
    }
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    async fn insert(&self, doc: &LogDocument) -> Result<(), BoxError> {
        let resp = self.client.post(self.endpoint()).json(doc).send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("OpenSearch insert failed with status {}: {}", status, text).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_targets_index_doc_api() {
        let store = OpenSearchStore::new("http://localhost:9200/", "app-logs");
        assert_eq!(store.endpoint(), "http://localhost:9200/app-logs/_doc");
    }
}
