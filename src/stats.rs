//! Aggregate analytics over the event history.
//!
//! Everything here is a pure function over an immutable event set, grouped
//! by the derived agent (first hyphen-delimited segment of the session id).
//! Recomputed from scratch on every criteria change.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{Event, EventKind};

/// Number of one-minute activity buckets, ending at "now".
pub const ACTIVITY_BUCKETS: usize = 5;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentStats {
    /// Count of `PostToolUse` events for this agent.
    pub total_tasks: u64,
    pub successful_tasks: u64,
    /// `successful / total * 100`, one decimal. 0 when there are no tasks.
    pub success_rate: f64,
    /// Tool name (`payload.tool`) to occurrence count.
    pub tool_usage: BTreeMap<String, u64>,
    /// Per-session spans: `max(timestamp) - min(timestamp)` in milliseconds
    /// across all events sharing a session id.
    pub execution_times_ms: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityBucket {
    pub anchor: DateTime<Utc>,
    /// Events whose timestamp falls within one minute of the anchor.
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub agents: BTreeMap<String, AgentStats>,
    pub activity: Vec<ActivityBucket>,
}

/// Compute the full analytics summary over an event set.
pub fn aggregate<'a>(events: impl IntoIterator<Item = &'a Event>, now: DateTime<Utc>) -> Summary {
    let events: Vec<&Event> = events.into_iter().collect();
    Summary {
        agents: per_agent(&events),
        activity: activity(&events, now),
    }
}

/// Per-agent task counts, tool usage, success rates, and session spans.
pub fn per_agent(events: &[&Event]) -> BTreeMap<String, AgentStats> {
    let mut agents: BTreeMap<String, AgentStats> = BTreeMap::new();
    // Session id -> (agent, earliest ts, latest ts), for execution spans.
    let mut spans: HashMap<&str, (String, DateTime<Utc>, DateTime<Utc>)> = HashMap::new();

    for event in events {
        let stats = agents.entry(event.agent().to_string()).or_default();

        if event.kind == EventKind::PostToolUse {
            stats.total_tasks += 1;
            if is_successful(event) {
                stats.successful_tasks += 1;
            }
        }

        if let Some(tool) = event.payload.get("tool").and_then(|v| v.as_str()) {
            *stats.tool_usage.entry(tool.to_string()).or_default() += 1;
        }

        if let Some(ts) = event.timestamp {
            spans
                .entry(event.session_id.as_str())
                .and_modify(|(_, lo, hi)| {
                    *lo = ts.min(*lo);
                    *hi = ts.max(*hi);
                })
                .or_insert_with(|| (event.agent().to_string(), ts, ts));
        }
    }

    for (_, (agent, lo, hi)) in spans {
        if let Some(stats) = agents.get_mut(&agent) {
            stats.execution_times_ms.push((hi - lo).num_milliseconds());
        }
    }

    for stats in agents.values_mut() {
        stats.success_rate = success_rate(stats.successful_tasks, stats.total_tasks);
    }

    agents
}

/// Five one-minute buckets ending at `now`, counting events whose timestamp
/// falls within one minute of each bucket's anchor. Events without a parsed
/// timestamp never land in a bucket.
pub fn activity(events: &[&Event], now: DateTime<Utc>) -> Vec<ActivityBucket> {
    (0..ACTIVITY_BUCKETS)
        .map(|i| {
            let anchor = now - Duration::minutes((ACTIVITY_BUCKETS - 1 - i) as i64);
            let count = events
                .iter()
                .filter(|e| {
                    e.timestamp
                        .is_some_and(|ts| (ts - anchor).abs() <= Duration::minutes(1))
                })
                .count() as u64;
            ActivityBucket { anchor, count }
        })
        .collect()
}

/// Success percentage rounded to one decimal. Zero tasks is 0, not NaN.
pub fn success_rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = successful as f64 / total as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

/// A task counts as successful when its payload says so. Missing keys count
/// as not successful.
fn is_successful(event: &Event) -> bool {
    event
        .payload
        .get("success")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
        || event.payload.get("status").and_then(serde_json::Value::as_str) == Some("success")
}
