//! Core data model.
//!
//! An event is one telemetry record from an agent process. Events arrive
//! over the wire as loosely-typed JSON, are canonicalized by intake, and
//! are immutable from then on.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ---------------------------------------------------------------------------
// Wire protocol
// ---------------------------------------------------------------------------

/// One frame from the streaming connection.
///
/// The source speaks two shapes: an informational handshake sent on open,
/// and telemetry records. Anything else fails to parse and is dropped by
/// the stream reader.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireMessage {
    Handshake(Handshake),
    Event(WireEvent),
}

/// `{"type": "connection", "message": ...}` — informational only.
#[derive(Debug, Clone, Deserialize)]
pub struct Handshake {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// A telemetry record as it appears on the wire. Every field is optional
/// here; intake decides what is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireEvent {
    pub event_type: Option<String>,
    pub session_id: Option<String>,
    pub app: Option<String>,
    pub timestamp: Option<String>,
    pub summary: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub ai_summary: Option<String>,
    pub id: Option<String>,
}

impl WireEvent {
    pub fn new(
        event_type: impl Into<String>,
        session_id: impl Into<String>,
        app: impl Into<String>,
    ) -> Self {
        Self {
            event_type: Some(event_type.into()),
            session_id: Some(session_id.into()),
            app: Some(app.into()),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn timestamp(mut self, ts: impl Into<String>) -> Self {
        self.timestamp = Some(ts.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn ai_summary(mut self, text: impl Into<String>) -> Self {
        self.ai_summary = Some(text.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A canonical telemetry event. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Internally unique identifier: the source id fused with arrival time,
    /// or a fresh UUID when the source supplied no id.
    pub id: String,

    /// The id the source sent, if any. Duplicate suppression keys on this.
    pub source_id: Option<String>,

    /// The emitting agent/process.
    pub app: String,

    /// Logical run identifier. Project and agent groupings derive from it.
    pub session_id: String,

    /// What kind of event this is.
    pub kind: EventKind,

    /// Event time as parsed from the wire. None when the wire string did
    /// not parse; such events still flow through every stage.
    pub timestamp: Option<DateTime<Utc>>,

    /// The wire timestamp string, kept verbatim for export.
    pub timestamp_raw: String,

    /// Short human-readable text.
    pub summary: Option<String>,

    /// Opaque structured data. The engine never assumes a schema; all
    /// access is missing-key tolerant.
    pub payload: serde_json::Value,

    /// Optional long-form narrative attached to terminal events.
    pub ai_summary: Option<String>,

    /// When intake accepted this event.
    pub received_at: DateTime<Utc>,
}

impl Event {
    /// The aggregation grouping key: the first hyphen-delimited segment
    /// of the session id.
    pub fn agent(&self) -> &str {
        self.session_id.split('-').next().unwrap_or(&self.session_id)
    }
}

// ---------------------------------------------------------------------------
// Event kind
// ---------------------------------------------------------------------------

/// The fixed event-type enumeration. Unrecognized values are tolerated and
/// carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    PreToolUse,
    PostToolUse,
    Notification,
    Stop,
    SubAgentStop,
    UserPromptSubmit,
    PreCompact,
    Other(String),
}

impl EventKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "PreToolUse" => Self::PreToolUse,
            "PostToolUse" => Self::PostToolUse,
            "Notification" => Self::Notification,
            "Stop" => Self::Stop,
            "SubAgentStop" => Self::SubAgentStop,
            "UserPromptSubmit" => Self::UserPromptSubmit,
            "PreCompact" => Self::PreCompact,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::Notification => "Notification",
            Self::Stop => "Stop",
            Self::SubAgentStop => "SubAgentStop",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PreCompact => "PreCompact",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Presentation slot
// ---------------------------------------------------------------------------

/// A transient wrapper around one event while it is staged in a lane.
///
/// Created at promotion, removed from the active set at expiry, and
/// mirrored permanently into the history log at creation time.
#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    pub event: Event,
    /// One of the fixed discrete lanes (see `stage::LANE_COUNT`).
    pub lane: u8,
    pub spawned_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Time window
// ---------------------------------------------------------------------------

/// A relative time window applied against event timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    /// No time filtering.
    #[default]
    All,
    /// Keep events with `timestamp >= now - duration`.
    Last(chrono::Duration),
}

impl TimeWindow {
    /// The inclusion cutoff for a given "now". None means no cutoff.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::All => None,
            Self::Last(d) => Some(now - *d),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = Error;

    /// Parses `"all"` or `<n><unit>` where unit is `m`, `h`, or `d`
    /// (e.g. `"15m"`, `"1h"`, `"24h"`, `"7d"`).
    fn from_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        if s.len() < 2 || !s.is_ascii() {
            return Err(Error::Window(s.to_string()));
        }
        let (num, unit) = s.split_at(s.len() - 1);
        let n: i64 = num.parse().map_err(|_| Error::Window(s.to_string()))?;
        match unit {
            "m" => Ok(Self::Last(chrono::Duration::minutes(n))),
            "h" => Ok(Self::Last(chrono::Duration::hours(n))),
            "d" => Ok(Self::Last(chrono::Duration::days(n))),
            _ => Err(Error::Window(s.to_string())),
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Last(d) => {
                if d.num_minutes() % (24 * 60) == 0 {
                    write!(f, "{}d", d.num_days())
                } else if d.num_minutes() % 60 == 0 {
                    write!(f, "{}h", d.num_hours())
                } else {
                    write!(f, "{}m", d.num_minutes())
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Filter criteria
// ---------------------------------------------------------------------------

/// A value object describing a filtered view over the event buffer.
/// Applying it never mutates the buffer; absent criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Exact match against the derived project (see `filter::derive_project`).
    pub project: Option<String>,
    /// Exact match against the emitting app.
    pub app: Option<String>,
    /// Exact match against the session id.
    pub session_id: Option<String>,
    /// Exact match against the event type string.
    pub event_type: Option<String>,
    /// Free-text search over summary, session id, and stringified payload.
    pub search: Option<String>,
    /// Compile `search` as a case-insensitive regex. A pattern that fails
    /// to compile degrades to plain substring matching.
    pub regex_mode: bool,
    /// Relative time window.
    pub window: TimeWindow,
    /// Multi-select event types. Empty means match all.
    pub event_types: HashSet<String>,
    /// Multi-select derived agents. Empty means match all.
    pub agents: HashSet<String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn event_type(mut self, kind: impl Into<String>) -> Self {
        self.event_type = Some(kind.into());
        self
    }

    pub fn search(mut self, needle: impl Into<String>) -> Self {
        self.search = Some(needle.into());
        self
    }

    pub fn regex(mut self, on: bool) -> Self {
        self.regex_mode = on;
        self
    }

    pub fn window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_event_type(mut self, kind: impl Into<String>) -> Self {
        self.event_types.insert(kind.into());
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agents.insert(agent.into());
        self
    }
}
