use crate::appender::RingSink;
use crate::diagnostics::DIAGNOSTIC_LOGGER;
use crate::record::{LogEvent, Location};
use crate::worker;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`LogEvent`]s and
/// appends them to a [`RingSink`].
///
/// Level and custom filtering happen inside the sink according to its
/// [`SinkConfig`](crate::config::SinkConfig). Events emitted by this crate
/// itself, and anything emitted while the sink is writing to its store
/// (HTTP client and driver logs), are skipped so the sink never feeds on
/// its own output.
pub struct RingSinkLayer {
    sink: Arc<RingSink>,
}

impl RingSinkLayer {
    pub fn new(sink: Arc<RingSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<RingSink> {
        &self.sink
    }
}

impl<S> Layer<S> for RingSinkLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if worker::is_sink_thread() {
            return;
        }
        let meta = event.metadata();
        if is_own_target(meta.target()) {
            return;
        }

        let mut properties = BTreeMap::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor { properties: &mut properties, message: &mut message };
        event.record(&mut visitor);

        let mut record = LogEvent::new(*meta.level(), meta.target(), message.unwrap_or_default());
        record.properties = properties;
        if meta.file().is_some() || meta.line().is_some() {
            record.location = Some(Location {
                file: meta.file().map(|s| s.to_string()),
                method: None,
                line: meta.line(),
                class: meta.module_path().map(|s| s.to_string()),
            });
        }

        self.sink.append(record);
    }
}

fn is_own_target(target: &str) -> bool {
    target == DIAGNOSTIC_LOGGER
        || target
            .strip_prefix(DIAGNOSTIC_LOGGER)
            .map_or(false, |rest| rest.starts_with("::"))
}

pub struct FieldVisitor<'a> {
    pub properties: &'a mut BTreeMap<String, String>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            *self.message = Some(value);
        } else {
            self.properties.insert(field.name().to_string(), value);
        }
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}
