//! Progress events emitted while a clone job runs.
//!
//! Events are serialized as flat JSON objects with a `type` tag, the shape
//! streamed to observers and stored in a job's event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Outcome of one clone, attached to the `complete` event and the job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneResult {
    pub success: bool,
    pub output_path: Option<String>,
    pub open_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CloneResult {
    pub fn succeeded(output_path: String, open_url: String, folder_name: String) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            open_url: Some(open_url),
            folder_name: Some(folder_name),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            open_url: None,
            folder_name: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Pipeline,
    Network,
    Console,
    Warning,
    Error,
    Complete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pipeline => "pipeline",
            EventKind::Network => "network",
            EventKind::Console => "console",
            EventKind::Warning => "warning",
            EventKind::Error => "error",
            EventKind::Complete => "complete",
        }
    }

    /// `complete` and `error` end a job's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Complete | EventKind::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CloneResult>,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            result: None,
        }
    }

    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::new(EventKind::Pipeline, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(EventKind::Network, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(EventKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, message)
    }

    /// Terminal error that still carries the job's final result.
    pub fn error_with_result(message: impl Into<String>, result: CloneResult) -> Self {
        Self {
            kind: EventKind::Error,
            message: message.into(),
            timestamp: Utc::now(),
            result: Some(result),
        }
    }

    pub fn complete(result: CloneResult) -> Self {
        let message = if result.success {
            "Clone completed successfully!".to_string()
        } else {
            format!(
                "Clone failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            )
        };
        Self {
            kind: EventKind::Complete,
            message,
            timestamp: Utc::now(),
            result: Some(result),
        }
    }

    /// Mirror the event into the tracing log.
    pub fn log(&self) {
        match self.kind {
            EventKind::Pipeline | EventKind::Complete => info!("[{}] {}", self.kind.as_str(), self.message),
            EventKind::Network | EventKind::Console => debug!("[{}] {}", self.kind.as_str(), self.message),
            EventKind::Warning => warn!("{}", self.message),
            EventKind::Error => error!("{}", self.message),
        }
    }
}

/// Receiver of pipeline progress.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

impl<F> EventSink for F
where
    F: Fn(Event) + Send + Sync,
{
    fn emit(&self, event: Event) {
        self(event)
    }
}

/// Sink that only writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Event) {
        event.log();
    }
}

/// Shorten long URLs for log lines.
pub fn truncate_url(url: &str, max_chars: usize) -> String {
    if url.chars().count() <= max_chars {
        url.to_string()
    } else {
        let head: String = url.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::pipeline("Downloading assets...");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "pipeline");
        assert_eq!(json["message"], "Downloading assets...");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_complete_event_carries_result() {
        let event = Event::complete(CloneResult::failed("boom"));
        assert!(event.kind.is_terminal());
        assert_eq!(event.message, "Clone failed: boom");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["result"]["success"], false);
        assert_eq!(json["result"]["error"], "boom");
        assert!(json["result"]["openUrl"].is_null());
    }

    #[test]
    fn test_terminal_error_carries_result() {
        let event = Event::error_with_result(
            "Clone failed unexpectedly: task panicked",
            CloneResult::failed("Clone failed unexpectedly: task panicked"),
        );
        assert!(event.kind.is_terminal());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["result"]["success"], false);
        assert_eq!(json["result"]["error"], "Clone failed unexpectedly: task panicked");
    }

    #[test]
    fn test_event_roundtrips_through_json() {
        let event = Event::complete(CloneResult::succeeded(
            "/out/x_2026".to_string(),
            "/clone/x_2026/index.html".to_string(),
            "x_2026".to_string(),
        ));
        let text = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_closure_sink() {
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |event: Event| seen.lock().unwrap().push(event.message);
        sink.emit(Event::warning("careful"));
        assert_eq!(seen.lock().unwrap().as_slice(), ["careful".to_string()]);
    }

    #[test]
    fn test_truncate_url() {
        assert_eq!(truncate_url("https://x.test/a", 80), "https://x.test/a");
        assert_eq!(truncate_url("abcdef", 3), "abc...");
    }
}
