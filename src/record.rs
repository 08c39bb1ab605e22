use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::OnceLock;
use tracing::Level;

/// A structured log event as handed to the sink by the host logging
/// framework.
///
/// Events are built once and never mutated after they enter the buffer;
/// the worker only reads them when transforming into a [`LogDocument`].
///
/// [`LogDocument`]: crate::document::LogDocument
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub thread: String,
    pub user: Option<String>,
    pub message: String,
    pub logger_name: String,
    pub domain: String,
    pub machine_name: String,
    pub location: Option<Location>,
    pub exception: Option<ExceptionInfo>,
    pub properties: BTreeMap<String, String>,
}

/// Source location of the call that produced an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub file: Option<String>,
    pub method: Option<String>,
    pub line: Option<u32>,
    pub class: Option<String>,
}

/// One link of a causal error chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub message: String,
    pub source: Option<String>,
    pub stack_trace: Option<String>,
    pub inner: Option<Box<ExceptionInfo>>,
}

impl LogEvent {
    /// Create an event stamped with the current time, thread, process and
    /// host.
    pub fn new(level: Level, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            level,
            thread: current_thread_name(),
            user: None,
            message: message.into(),
            logger_name: logger_name.into(),
            domain: process_domain().to_string(),
            machine_name: machine_name().to_string(),
            location: None,
            exception: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl ExceptionInfo {
    pub fn new(message: impl Into<String>) -> Self {
        ExceptionInfo {
            message: message.into(),
            source: None,
            stack_trace: None,
            inner: None,
        }
    }

    /// Build a chain from an error and its `source()` ancestors.
    ///
    /// The outermost error becomes the head; each `source()` becomes the
    /// `inner` of the previous link.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        ExceptionInfo {
            message: err.to_string(),
            source: None,
            stack_trace: None,
            inner: err.source().map(|cause| Box::new(ExceptionInfo::from_error(cause))),
        }
    }

    /// Number of links in the chain, including this one.
    pub fn depth(&self) -> usize {
        1 + self.inner.as_ref().map_or(0, |inner| inner.depth())
    }
}

fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

/// Name of the running executable, used as the event domain.
pub fn process_domain() -> &'static str {
    static DOMAIN: OnceLock<String> = OnceLock::new();
    DOMAIN.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "unknown".to_string())
    })
}

/// Host name as reported by the environment, falling back to
/// `/etc/hostname`.
pub fn machine_name() -> &'static str {
    static MACHINE: OnceLock<String> = OnceLock::new();
    MACHINE.get_or_init(|| {
        ["HOSTNAME", "COMPUTERNAME"]
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
            .or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_else(|| "unknown".to_string())
    })
}
