use crate::env::{
    env_or, RING_LOG_SINK_CAPACITY_ENV, RING_LOG_SINK_LEVEL_ENV, RING_LOG_SINK_OVERFLOW_WINDOW_SECS_ENV,
    RING_LOG_SINK_SHUTDOWN_TIMEOUT_MS_ENV,
};
use crate::record::LogEvent;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Predicate applied in `append`; returning `false` discards the event
/// before it reaches the buffer.
pub type EventFilter = Arc<dyn Fn(&LogEvent) -> bool + Send + Sync>;

/// Sink configuration.
///
/// **Fields**
/// - `capacity`: ring buffer size; once full, each new event evicts the
///   oldest unread one.
/// - `overflow_report_window`: minimum spacing between two overflow
///   diagnostics.
/// - `shutdown_timeout`: how long `close` waits for the worker to drain
///   before forcing a stop.
/// - `poll_interval`: upper bound on how long the idle worker parks before
///   re-checking the shutdown flag.
/// - `restart_backoff` / `max_restart_backoff`: delay applied when the
///   worker faults again shortly after a restart; doubles up to the max.
/// - `diagnostic_timeout`: bound on the direct forced-shutdown write made
///   by `close`.
/// - `level`: events more verbose than this are filtered out.
/// - `filter`: optional extra predicate.
#[derive(Clone)]
pub struct SinkConfig {
    pub capacity: usize,
    pub overflow_report_window: Duration,
    pub shutdown_timeout: Duration,
    pub poll_interval: Duration,
    pub restart_backoff: Duration,
    pub max_restart_backoff: Duration,
    pub diagnostic_timeout: Duration,
    pub level: LevelFilter,
    pub filter: Option<EventFilter>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            overflow_report_window: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            restart_backoff: Duration::from_millis(100),
            max_restart_backoff: Duration::from_secs(10),
            diagnostic_timeout: Duration::from_secs(1),
            level: LevelFilter::TRACE,
            filter: None,
        }
    }
}

impl fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkConfig")
            .field("capacity", &self.capacity)
            .field("overflow_report_window", &self.overflow_report_window)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("restart_backoff", &self.restart_backoff)
            .field("max_restart_backoff", &self.max_restart_backoff)
            .field("diagnostic_timeout", &self.diagnostic_timeout)
            .field("level", &self.level)
            .field("filter", &self.filter.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Error returned when reading configuration from the environment.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("invalid log level {0:?}")]
    InvalidLevel(String),
}

impl SinkConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&LogEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Defaults overridden by any `RING_LOG_SINK_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = SinkConfig::default();
        let capacity = parse_env(RING_LOG_SINK_CAPACITY_ENV, defaults.capacity as u64)? as usize;
        let window = parse_env(
            RING_LOG_SINK_OVERFLOW_WINDOW_SECS_ENV,
            defaults.overflow_report_window.as_secs(),
        )?;
        let shutdown = parse_env(
            RING_LOG_SINK_SHUTDOWN_TIMEOUT_MS_ENV,
            defaults.shutdown_timeout.as_millis() as u64,
        )?;
        let level_raw = env_or(RING_LOG_SINK_LEVEL_ENV, "trace");
        let level = level_raw
            .parse::<LevelFilter>()
            .map_err(|_| ConfigError::InvalidLevel(level_raw.clone()))?;

        Ok(SinkConfig {
            capacity,
            overflow_report_window: Duration::from_secs(window),
            shutdown_timeout: Duration::from_millis(shutdown),
            level,
            ..defaults
        })
    }

    /// Copy with minimal thresholds enforced to avoid degenerate configs.
    pub(crate) fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        cfg.capacity = cfg.capacity.max(1);
        cfg.poll_interval = cfg.poll_interval.max(Duration::from_millis(1));
        cfg.restart_backoff = cfg.restart_backoff.max(Duration::from_millis(1));
        cfg.max_restart_backoff = cfg.max_restart_backoff.max(cfg.restart_backoff);
        cfg
    }

    /// Whether `event` passes the level threshold and the user filter.
    pub fn accepts(&self, event: &LogEvent) -> bool {
        if event.level > self.level {
            return false;
        }
        self.filter.as_ref().map_or(true, |f| f(event))
    }
}

fn parse_env(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env_or(key, &default.to_string());
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber { key, value: raw })
}
