//! Environment variable names used by this crate for convenient
//! configuration of the sink from microservices.
//!
//! These are purely helpers; the core sink types remain decoupled from
//! environment access.

/// Store DSN, e.g. `opensearch://127.0.0.1:9200/logs`.
pub const RING_LOG_SINK_DSN_ENV: &str = "RING_LOG_SINK_DSN";

/// Ring buffer capacity.
pub const RING_LOG_SINK_CAPACITY_ENV: &str = "RING_LOG_SINK_CAPACITY";

/// Minimum seconds between two overflow diagnostics.
pub const RING_LOG_SINK_OVERFLOW_WINDOW_SECS_ENV: &str = "RING_LOG_SINK_OVERFLOW_WINDOW_SECS";

/// Milliseconds `close` waits for the buffer to drain.
pub const RING_LOG_SINK_SHUTDOWN_TIMEOUT_MS_ENV: &str = "RING_LOG_SINK_SHUTDOWN_TIMEOUT_MS";

/// Most verbose level accepted, e.g. `info`.
pub const RING_LOG_SINK_LEVEL_ENV: &str = "RING_LOG_SINK_LEVEL";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
