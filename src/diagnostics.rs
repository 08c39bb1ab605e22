//! Synthetic events describing the sink's own failures.
//!
//! These are written straight to the store through the same best-effort
//! path as ordinary events and never re-enter the buffer.

use crate::overflow::OverflowReport;
use crate::record::{ExceptionInfo, LogEvent};
use tracing::Level;

/// Logger name stamped on every diagnostic event.
pub const DIAGNOSTIC_LOGGER: &str = "ring_log_sink";

pub const APPENDER_EXCEPTION_PREFIX: &str = "Appender exception: ";

pub fn buffer_overflow(report: &OverflowReport) -> LogEvent {
    LogEvent::new(
        Level::ERROR,
        DIAGNOSTIC_LOGGER,
        format!(
            "Buffer overflow. {} logging events have been lost in the last {} seconds. [QueueSizeLimit: {}]",
            report.dropped,
            report.window.as_secs(),
            report.capacity
        ),
    )
}

pub fn forced_shutdown() -> LogEvent {
    LogEvent::new(
        Level::ERROR,
        DIAGNOSTIC_LOGGER,
        "Unable to clear out the log sink buffer in the allotted time, forcing a shutdown",
    )
}

/// `context` names where the fault happened; `detail` is the panic payload
/// or error text.
pub fn appender_exception(context: &str, detail: &str) -> LogEvent {
    let mut exception = ExceptionInfo::new(detail);
    exception.source = Some(DIAGNOSTIC_LOGGER.to_string());
    LogEvent::new(
        Level::ERROR,
        DIAGNOSTIC_LOGGER,
        format!("{APPENDER_EXCEPTION_PREFIX}{context}"),
    )
    .with_exception(exception)
}
