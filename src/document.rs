use crate::record::{ExceptionInfo, LogEvent};
use serde::Serialize;
use std::collections::BTreeMap;

/// Record shape written to the document store, one per event.
///
/// Location fields are flattened into the top level and omitted when the
/// event carries no location, matching the schema existing collections
/// are indexed on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogDocument {
    pub timestamp: String,
    pub level: String,
    pub thread: String,
    pub user_name: String,
    pub message: String,
    pub logger_name: String,
    pub domain: String,
    pub machine_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDocument {
    pub message: String,
    pub source: Option<String>,
    pub stack_trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_exception: Option<Box<ExceptionDocument>>,
}

impl From<&ExceptionInfo> for ExceptionDocument {
    fn from(ex: &ExceptionInfo) -> Self {
        ExceptionDocument {
            message: ex.message.clone(),
            source: ex.source.clone(),
            stack_trace: ex.stack_trace.clone(),
            inner_exception: ex.inner.as_deref().map(|inner| Box::new(ExceptionDocument::from(inner))),
        }
    }
}

impl From<&LogEvent> for LogDocument {
    fn from(event: &LogEvent) -> Self {
        let location = event.location.as_ref();
        LogDocument {
            timestamp: event.timestamp.to_rfc3339(),
            level: event.level.to_string(),
            thread: event.thread.clone(),
            user_name: event.user.clone().unwrap_or_default(),
            message: event.message.clone(),
            logger_name: event.logger_name.clone(),
            domain: event.domain.clone(),
            machine_name: event.machine_name.clone(),
            file_name: location.and_then(|l| l.file.clone()),
            method: location.and_then(|l| l.method.clone()),
            line_number: location.and_then(|l| l.line),
            class_name: location.and_then(|l| l.class.clone()),
            exception: event.exception.as_ref().map(ExceptionDocument::from),
            properties: if event.properties.is_empty() {
                None
            } else {
                Some(event.properties.clone())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Location;
    use tracing::Level;

    #[test]
    fn serializes_with_camel_case_and_omits_empty_parts() {
        let event = LogEvent::new(Level::ERROR, "billing", "charge failed");
        let json = serde_json::to_value(LogDocument::from(&event)).unwrap();

        assert_eq!(json["level"], "ERROR");
        assert_eq!(json["loggerName"], "billing");
        assert_eq!(json["userName"], "");
        assert!(json.get("fileName").is_none());
        assert!(json.get("exception").is_none());
        assert!(json.get("properties").is_none());
    }

    #[test]
    fn carries_location_exception_and_properties() {
        let mut outer = ExceptionInfo::new("outer");
        outer.inner = Some(Box::new(ExceptionInfo::new("inner")));
        let event = LogEvent::new(Level::INFO, "svc", "msg")
            .with_location(Location {
                file: Some("src/main.rs".into()),
                method: Some("main".into()),
                line: Some(42),
                class: None,
            })
            .with_exception(outer)
            .with_property("order_id", "7");

        let json = serde_json::to_value(LogDocument::from(&event)).unwrap();
        assert_eq!(json["fileName"], "src/main.rs");
        assert_eq!(json["lineNumber"], 42);
        assert!(json.get("className").is_none());
        assert_eq!(json["exception"]["innerException"]["message"], "inner");
        assert_eq!(json["properties"]["order_id"], "7");
    }
}
