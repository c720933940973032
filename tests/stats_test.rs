//! Integration tests for aggregation: task counts, success rates, tool
//! usage, execution spans, activity buckets.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use swarmwatch::ingest::EventBuffer;
use swarmwatch::model::{Event, WireEvent};
use swarmwatch::stats::{ACTIVITY_BUCKETS, aggregate, success_rate};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap()
}

fn ingest(wire: WireEvent) -> Event {
    EventBuffer::default()
        .ingest(wire)
        .expect("test event should ingest")
}

// ---------------------------------------------------------------------------
// Success rate
// ---------------------------------------------------------------------------

#[test]
fn success_rate_three_of_four_is_seventy_five() {
    let mut events = Vec::new();
    for n in 0..4 {
        let mut wire =
            WireEvent::new("PostToolUse", format!("alpha-{n}"), "agent-a").id(format!("e{n}"));
        if n < 3 {
            wire = wire.payload(json!({"success": true}));
        }
        events.push(ingest(wire));
    }

    let summary = aggregate(&events, now());
    let alpha = &summary.agents["alpha"];

    assert_eq!(alpha.total_tasks, 4);
    assert_eq!(alpha.successful_tasks, 3);
    assert_eq!(alpha.success_rate, 75.0);
}

#[test]
fn zero_tasks_is_zero_rate_not_nan() {
    let events = vec![ingest(WireEvent::new("PreToolUse", "alpha-1", "agent-a"))];

    let summary = aggregate(&events, now());
    let alpha = &summary.agents["alpha"];

    assert_eq!(alpha.total_tasks, 0);
    assert_eq!(alpha.success_rate, 0.0);
}

#[test]
fn success_rate_rounds_to_one_decimal() {
    assert_eq!(success_rate(1, 3), 33.3);
    assert_eq!(success_rate(2, 3), 66.7);
    assert_eq!(success_rate(0, 0), 0.0);
    assert_eq!(success_rate(5, 5), 100.0);
}

#[test]
fn status_success_also_counts() {
    let events = vec![
        ingest(
            WireEvent::new("PostToolUse", "alpha-1", "agent-a")
                .payload(json!({"status": "success"})),
        ),
        ingest(WireEvent::new("PostToolUse", "alpha-2", "agent-a").payload(json!({"status": "failed"}))),
    ];

    let alpha = &aggregate(&events, now()).agents["alpha"];
    assert_eq!(alpha.successful_tasks, 1);
    assert_eq!(alpha.success_rate, 50.0);
}

// ---------------------------------------------------------------------------
// Grouping and tool usage
// ---------------------------------------------------------------------------

#[test]
fn agents_group_by_leading_session_segment() {
    let events = vec![
        ingest(WireEvent::new("PostToolUse", "alpha-1", "agent-a")),
        ingest(WireEvent::new("PostToolUse", "alpha-2", "agent-a")),
        ingest(WireEvent::new("PostToolUse", "beta-1", "agent-b")),
    ];

    let summary = aggregate(&events, now());
    assert_eq!(summary.agents.len(), 2);
    assert_eq!(summary.agents["alpha"].total_tasks, 2);
    assert_eq!(summary.agents["beta"].total_tasks, 1);
}

#[test]
fn tool_usage_counts_per_agent() {
    let events = vec![
        ingest(WireEvent::new("PreToolUse", "alpha-1", "agent-a").payload(json!({"tool": "grep"}))),
        ingest(
            WireEvent::new("PostToolUse", "alpha-1", "agent-a").payload(json!({"tool": "grep"})),
        ),
        ingest(
            WireEvent::new("PostToolUse", "alpha-1", "agent-a").payload(json!({"tool": "cargo"})),
        ),
        ingest(WireEvent::new("PostToolUse", "beta-1", "agent-b").payload(json!({"tool": "grep"}))),
        ingest(WireEvent::new("Stop", "alpha-1", "agent-a")),
    ];

    let summary = aggregate(&events, now());
    assert_eq!(summary.agents["alpha"].tool_usage["grep"], 2);
    assert_eq!(summary.agents["alpha"].tool_usage["cargo"], 1);
    assert_eq!(summary.agents["beta"].tool_usage["grep"], 1);
}

// ---------------------------------------------------------------------------
// Execution spans
// ---------------------------------------------------------------------------

#[test]
fn execution_time_spans_first_to_last_event_per_session() {
    let t = now();
    let events = vec![
        ingest(
            WireEvent::new("PreToolUse", "alpha-run1", "agent-a")
                .timestamp(t.to_rfc3339()),
        ),
        ingest(
            WireEvent::new("PostToolUse", "alpha-run1", "agent-a")
                .timestamp((t + Duration::seconds(90)).to_rfc3339()),
        ),
        ingest(
            WireEvent::new("Stop", "alpha-run1", "agent-a")
                .timestamp((t + Duration::seconds(45)).to_rfc3339()),
        ),
    ];

    let alpha = &aggregate(&events, now()).agents["alpha"];
    assert_eq!(alpha.execution_times_ms, vec![90_000]);
}

#[test]
fn each_session_contributes_its_own_span() {
    let t = now();
    let events = vec![
        ingest(WireEvent::new("Stop", "alpha-run1", "agent-a").timestamp(t.to_rfc3339())),
        ingest(
            WireEvent::new("Stop", "alpha-run1", "agent-a")
                .timestamp((t + Duration::seconds(10)).to_rfc3339()),
        ),
        ingest(WireEvent::new("Stop", "alpha-run2", "agent-a").timestamp(t.to_rfc3339())),
    ];

    let alpha = &aggregate(&events, now()).agents["alpha"];
    let mut spans = alpha.execution_times_ms.clone();
    spans.sort_unstable();
    assert_eq!(spans, vec![0, 10_000]);
}

// ---------------------------------------------------------------------------
// Activity buckets
// ---------------------------------------------------------------------------

#[test]
fn activity_uses_five_minute_buckets_ending_now() {
    let t = now();
    let events = vec![
        ingest(WireEvent::new("Stop", "alpha-1", "agent-a").timestamp(t.to_rfc3339())),
        ingest(
            WireEvent::new("Stop", "alpha-2", "agent-a")
                .timestamp((t - Duration::seconds(30)).to_rfc3339()),
        ),
        ingest(
            WireEvent::new("Stop", "alpha-3", "agent-a")
                .timestamp((t - Duration::minutes(10)).to_rfc3339()),
        ),
    ];

    let summary = aggregate(&events, t);
    assert_eq!(summary.activity.len(), ACTIVITY_BUCKETS);
    assert_eq!(summary.activity.last().unwrap().anchor, t);

    // Both recent events are within a minute of the "now" anchor; the
    // ten-minute-old event lands in no bucket.
    assert_eq!(summary.activity.last().unwrap().count, 2);
    assert_eq!(summary.activity.first().unwrap().count, 0);
    let total: u64 = summary.activity.iter().map(|b| b.count).sum();
    assert!(total >= 2);
}

#[test]
fn events_without_timestamps_never_land_in_buckets() {
    let events = vec![ingest(WireEvent::new("Stop", "alpha-1", "agent-a").timestamp("junk"))];

    let summary = aggregate(&events, now());
    assert!(summary.activity.iter().all(|b| b.count == 0));
}

// ---------------------------------------------------------------------------
// Purity
// ---------------------------------------------------------------------------

#[test]
fn aggregation_does_not_mutate_its_input() {
    let events = vec![
        ingest(WireEvent::new("PostToolUse", "alpha-1", "agent-a").payload(json!({"success": true}))),
    ];
    let before: Vec<String> = events.iter().map(|e| e.id.clone()).collect();

    let _ = aggregate(&events, now());
    let _ = aggregate(&events, now());

    let after: Vec<String> = events.iter().map(|e| e.id.clone()).collect();
    assert_eq!(before, after);
    assert_eq!(events.len(), 1);
}
