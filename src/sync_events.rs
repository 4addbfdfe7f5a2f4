use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::log_classify::{classify_log_line, LogCategory, LogTone};

pub const SYNC_STARTED_EVENT: &str = "sync-started";
pub const SYNC_LOG_EVENT: &str = "sync-log";
pub const SYNC_STOPPED_EVENT: &str = "sync-stopped";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStream {
    Stdout,
    Stderr,
    /// Lines synthesized by the supervisor itself.
    Supervisor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogLine {
    pub session_id: String,
    pub stream: SyncStream,
    pub line: String,
    pub category: LogCategory,
    pub tone: LogTone,
    pub received_at: String,
}

impl SyncLogLine {
    pub fn new(session_id: &str, stream: SyncStream, line: String) -> Self {
        let category = classify_log_line(&line);
        Self {
            session_id: session_id.to_string(),
            stream,
            line,
            category,
            tone: category.tone(),
            received_at: crate::now_iso(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStartedEvent {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub project_directory: String,
    pub script_path: String,
    pub started_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStoppedEvent {
    pub session_id: String,
    pub exit_code: Option<i32>,
    pub stopped_by_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Started(SyncStartedEvent),
    Log(SyncLogLine),
    Stopped(SyncStoppedEvent),
}

impl SyncEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started(_) => SYNC_STARTED_EVENT,
            Self::Log(_) => SYNC_LOG_EVENT,
            Self::Stopped(_) => SYNC_STOPPED_EVENT,
        }
    }
}

/// Receives supervisor events as they happen. Implementations must not block.
pub trait SyncEventSink: Send + Sync + 'static {
    fn emit(&self, event: SyncEvent);
}

impl SyncEventSink for UnboundedSender<SyncEvent> {
    fn emit(&self, event: SyncEvent) {
        let _ = self.send(event);
    }
}

/// Sink that drops every event, for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardEvents;

impl SyncEventSink for DiscardEvents {
    fn emit(&self, _event: SyncEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_line_serializes_camel_case_with_category() {
        let line = SyncLogLine::new("s-1", SyncStream::Stderr, "[PUSH] ok".to_string());
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["sessionId"], "s-1");
        assert_eq!(value["stream"], "stderr");
        assert_eq!(value["category"], "push");
        assert_eq!(value["tone"], "success");
        assert!(value["receivedAt"].as_str().is_some());
    }

    #[test]
    fn stopped_event_keeps_null_exit_code() {
        let event = SyncStoppedEvent {
            session_id: "s-2".to_string(),
            exit_code: None,
            stopped_by_user: true,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value["exitCode"].is_null());
        assert_eq!(value["stoppedByUser"], true);
        assert_eq!(SyncEvent::Stopped(event).name(), SYNC_STOPPED_EVENT);
    }
}
