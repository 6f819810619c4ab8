/// WebSocket message schema - envelope and typed event payloads
///
/// Every server → client message is an `Envelope`:
/// `{"type": <tag>, "payload": <value>, "timestamp": <RFC3339>}`.
///
/// On the producing side events are built as the typed `Event` enum; the
/// payload is only turned into a JSON value when the envelope is built.
/// On the consuming side `Envelope::event` decodes by tag and returns
/// `Ok(None)` for tags it does not know, so new producers never break
/// existing clients.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A serialized envelope, shared read-only by every client it is delivered to
pub type Frame = Arc<str>;

/// Separator between envelopes coalesced into one outbound text message
pub const FRAME_SEPARATOR: char = '\n';

// ============================================================================
// EVENT KINDS
// ============================================================================

/// Event tags known to this server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Metrics,
    DockerLog,
    K8sEvent,
    AnsibleExec,
}

impl EventKind {
    /// Tag string used in the envelope `type` field
    pub fn code(&self) -> &'static str {
        match self {
            EventKind::Metrics => "metrics",
            EventKind::DockerLog => "docker-log",
            EventKind::K8sEvent => "k8s-event",
            EventKind::AnsibleExec => "ansible-exec",
        }
    }

    /// Parse a tag string
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "metrics" => Some(EventKind::Metrics),
            "docker-log" => Some(EventKind::DockerLog),
            "k8s-event" => Some(EventKind::K8sEvent),
            "ansible-exec" => Some(EventKind::AnsibleExec),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// Host resource sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub cpu_count: usize,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_percent: f32,
    pub swap_used_mb: u64,
    pub load_average: LoadAverage,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

/// Output stream a log line was written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub stream: LogStream,
    pub message: String,
}

/// New log lines from one container since the previous tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerLogs {
    pub container_id: String,
    pub container_name: String,
    pub lines: Vec<LogLine>,
}

/// Object an orchestrator event refers to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: String,
    pub name: String,
}

/// One orchestrator event not seen on a previous tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub namespace: String,
    pub name: String,
    /// "Normal" or "Warning"
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub object: ObjectRef,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

/// Result of one playbook execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookRun {
    pub id: String,
    pub playbook: String,
    pub status: RunStatus,
    pub exit_code: i32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub hosts: Vec<String>,
    #[serde(default)]
    pub output: String,
}

impl PlaybookRun {
    /// Wall-clock duration, once the run has finished
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0))
    }
}

// ============================================================================
// EVENT
// ============================================================================

/// Typed event emitted by a producer
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Metrics(SystemMetrics),
    DockerLog(ContainerLogs),
    K8sEvent(ClusterEvent),
    AnsibleExec(PlaybookRun),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Metrics(_) => EventKind::Metrics,
            Event::DockerLog(_) => EventKind::DockerLog,
            Event::K8sEvent(_) => EventKind::K8sEvent,
            Event::AnsibleExec(_) => EventKind::AnsibleExec,
        }
    }

    fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Event::Metrics(p) => serde_json::to_value(p),
            Event::DockerLog(p) => serde_json::to_value(p),
            Event::K8sEvent(p) => serde_json::to_value(p),
            Event::AnsibleExec(p) => serde_json::to_value(p),
        }
    }
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// Wire-level message unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event tag; the set is open
    #[serde(rename = "type")]
    pub kind: String,

    pub payload: serde_json::Value,

    /// Emission time, serialized as RFC3339
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Wrap an event, stamped with the current time
    pub fn new(event: &Event) -> Result<Self, serde_json::Error> {
        Self::at(event, Utc::now())
    }

    /// Wrap an event with an explicit timestamp
    pub fn at(event: &Event, timestamp: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: event.kind().code().to_string(),
            payload: event.payload()?,
            timestamp,
        })
    }

    /// Build an envelope for a tag this server has no typed payload for
    pub fn untyped(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Serialize once for fan-out
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }

    /// Decode the payload by tag
    ///
    /// Returns `Ok(None)` for unknown tags.
    pub fn event(&self) -> Result<Option<Event>, serde_json::Error> {
        let Some(kind) = EventKind::from_code(&self.kind) else {
            return Ok(None);
        };
        let payload = self.payload.clone();
        let event = match kind {
            EventKind::Metrics => Event::Metrics(serde_json::from_value(payload)?),
            EventKind::DockerLog => Event::DockerLog(serde_json::from_value(payload)?),
            EventKind::K8sEvent => Event::K8sEvent(serde_json::from_value(payload)?),
            EventKind::AnsibleExec => Event::AnsibleExec(serde_json::from_value(payload)?),
        };
        Ok(Some(event))
    }
}

/// Split one outbound text message into its envelopes
///
/// The outbound pump coalesces queued frames into a single message, one
/// envelope per line.
pub fn parse_message(text: &str) -> Result<Vec<Envelope>, serde_json::Error> {
    text.split(FRAME_SEPARATOR)
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}
