//! Event intake: validation, duplicate suppression, bounded buffering.
//!
//! The buffer is the single source of truth for event history. It has one
//! writer (this module) and multiple readers (staging, filtering); readers
//! re-derive their views on demand rather than caching.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::{Event, EventKind, WireEvent};

/// Default buffer capacity. Oldest events are evicted beyond this.
pub const DEFAULT_CAPACITY: usize = 500;

/// Bounded, most-recent-first event history with duplicate suppression.
pub struct EventBuffer {
    capacity: usize,
    events: VecDeque<Event>,
    /// Source ids ever accepted. Suppression keys on the source id alone,
    /// so this outlives eviction from the buffer. Unbounded, like the
    /// history log (see DESIGN.md).
    seen: HashSet<String>,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            seen: HashSet::new(),
        }
    }

    /// Validate, dedup, and buffer one wire record.
    ///
    /// Returns the canonical event on acceptance. Returns None, non-fatally,
    /// when a required field is missing or the source id was already seen.
    pub fn ingest(&mut self, wire: WireEvent) -> Option<Event> {
        let Some(kind) = wire.event_type else {
            debug!("discarding event without event_type");
            return None;
        };
        let Some(session_id) = wire.session_id else {
            debug!("discarding event without session_id");
            return None;
        };
        let Some(app) = wire.app else {
            debug!("discarding event without app");
            return None;
        };

        if let Some(ref source_id) = wire.id {
            if !self.seen.insert(source_id.clone()) {
                debug!(source_id = %source_id, "duplicate event dropped");
                return None;
            }
        }

        let received_at = Utc::now();

        // Internal id folds in arrival time so repeated deliveries would
        // still be distinguishable; suppression above keys on the source
        // id alone.
        let id = match wire.id {
            Some(ref source_id) => format!("{source_id}-{}", received_at.timestamp_millis()),
            None => Uuid::new_v4().to_string(),
        };

        let timestamp_raw = wire.timestamp.unwrap_or_default();
        let timestamp = parse_timestamp(&timestamp_raw);
        if timestamp.is_none() && !timestamp_raw.is_empty() {
            warn!(raw = %timestamp_raw, "unparseable event timestamp, keeping event");
        }

        let event = Event {
            id,
            source_id: wire.id,
            app,
            session_id,
            kind: EventKind::parse(&kind),
            timestamp,
            timestamp_raw,
            summary: wire.summary,
            payload: wire.payload.unwrap_or(serde_json::Value::Null),
            ai_summary: wire.ai_summary,
            received_at,
        };

        self.events.push_front(event.clone());
        self.events.truncate(self.capacity);

        Some(event)
    }

    /// Events, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Lenient ISO-8601 parse. The wire format is RFC 3339 in practice, but
/// sources have been seen omitting the timezone offset.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}
