pub mod record;
pub mod document;
pub mod store;
pub mod ring;
pub mod overflow;
pub mod diagnostics;
pub mod config;
pub mod worker;
pub mod appender;
pub mod stats;
pub mod layer;

pub mod backend;

#[cfg(feature = "opensearch")]
pub mod opensearch;

#[cfg(feature = "clickhouse")]
pub mod clickhouse;

pub mod env;
pub mod init;
pub mod memory_store;
pub mod noop_store;

pub use appender::{RingSink, SinkError};
pub use config::SinkConfig;
pub use record::LogEvent;
pub use store::DocumentStore;
