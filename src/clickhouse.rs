use crate::document::LogDocument;
use crate::store::{BoxError, DocumentStore};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Configuration for [`ClickHouseStore`].
///
/// The store talks to ClickHouse over HTTP using the `JSONEachRow` format,
/// one row per request.
#[derive(Clone, Debug)]
pub struct ClickHouseConfig {
    /// Base URL without query, e.g. "http://127.0.0.1:8123"
    pub url: String,
    pub database: String,
    pub table: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// ClickHouse implementation of [`DocumentStore`] using the HTTP interface.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: Client,
    config: ClickHouseConfig,
}

impl ClickHouseStore {
    pub fn new(config: ClickHouseConfig) -> Self {
        let client = Client::new();
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        let mut query = format!(
            "database={}&query=INSERT%20INTO%20{}%20FORMAT%20JSONEachRow",
            urlencoding::encode(&self.config.database),
            urlencoding::encode(&self.config.table)
        );

        if let Some(user) = &self.config.user {
            query.push_str(&format!("&user={}", urlencoding::encode(user)));
        }
        if let Some(password) = &self.config.password {
            query.push_str(&format!("&password={}", urlencoding::encode(password)));
        }

        format!("{}/?{}", self.config.url.trim_end_matches('/'), query)
    }
}

/// Flat row layout: nested parts are stored as JSON strings so the table
/// can use plain `String` columns.
#[derive(Serialize)]
struct ClickHouseRow<'a> {
    timestamp: &'a str,
    level: &'a str,
    thread: &'a str,
    user_name: &'a str,
    message: &'a str,
    logger_name: &'a str,
    domain: &'a str,
    machine_name: &'a str,
    file_name: Option<&'a str>,
    method: Option<&'a str>,
    line_number: Option<u32>,
    class_name: Option<&'a str>,
    exception: Option<String>,
    properties: String,
}

fn map_document(doc: &LogDocument) -> Result<ClickHouseRow<'_>, serde_json::Error> {
    Ok(ClickHouseRow {
        timestamp: &doc.timestamp,
        level: &doc.level,
        thread: &doc.thread,
        user_name: &doc.user_name,
        message: &doc.message,
        logger_name: &doc.logger_name,
        domain: &doc.domain,
        machine_name: &doc.machine_name,
        file_name: doc.file_name.as_deref(),
        method: doc.method.as_deref(),
        line_number: doc.line_number,
        class_name: doc.class_name.as_deref(),
        exception: doc.exception.as_ref().map(serde_json::to_string).transpose()?,
        properties: serde_json::to_string(&doc.properties.clone().unwrap_or_default())?,
    })
}

#[async_trait]
impl DocumentStore for ClickHouseStore {
    async fn insert(&self, doc: &LogDocument) -> Result<(), BoxError> {
        let row = map_document(doc)?;
        let body = serde_json::to_string(&row)? + "\n";
        let resp = self.client.post(self.endpoint()).body(body).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("ClickHouse insert failed with status {}: {}", status, text).into())
        }
    }
}
