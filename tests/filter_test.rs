//! Integration tests for the filter engine: windows, search, derivation.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use swarmwatch::filter::{apply, derive_project};
use swarmwatch::ingest::EventBuffer;
use swarmwatch::model::{Event, FilterCriteria, TimeWindow, WireEvent};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap()
}

fn ingest(wire: WireEvent) -> Event {
    EventBuffer::default()
        .ingest(wire)
        .expect("test event should ingest")
}

fn at(minutes_ago: i64) -> String {
    (now() - Duration::minutes(minutes_ago)).to_rfc3339()
}

// ---------------------------------------------------------------------------
// Time window
// ---------------------------------------------------------------------------

#[test]
fn window_keeps_only_recent_events() {
    let events = vec![
        ingest(WireEvent::new("Stop", "alpha-1", "agent-a").timestamp(at(10))),
        ingest(WireEvent::new("Stop", "alpha-2", "agent-a").timestamp(at(2))),
    ];

    let criteria = FilterCriteria::new().window("5m".parse().unwrap());
    let kept = apply(&events, &criteria, now());

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].session_id, "alpha-2");
}

#[test]
fn window_all_disables_time_filtering() {
    let events = vec![
        ingest(WireEvent::new("Stop", "alpha-1", "agent-a").timestamp(at(60 * 24 * 30))),
        ingest(WireEvent::new("Stop", "alpha-2", "agent-a").timestamp(at(1))),
    ];

    let criteria = FilterCriteria::new().window(TimeWindow::All);
    assert_eq!(apply(&events, &criteria, now()).len(), 2);
}

#[test]
fn unparseable_timestamp_is_retained_under_any_window() {
    let events = vec![
        ingest(WireEvent::new("Stop", "alpha-1", "agent-a").timestamp("garbage")),
        ingest(WireEvent::new("Stop", "alpha-2", "agent-a").timestamp(at(90))),
    ];

    let criteria = FilterCriteria::new().window("1h".parse().unwrap());
    let kept = apply(&events, &criteria, now());

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].session_id, "alpha-1");
}

#[test]
fn window_strings_parse() {
    assert_eq!("all".parse::<TimeWindow>().unwrap(), TimeWindow::All);
    assert_eq!(
        "15m".parse::<TimeWindow>().unwrap(),
        TimeWindow::Last(Duration::minutes(15))
    );
    assert_eq!(
        "24h".parse::<TimeWindow>().unwrap(),
        TimeWindow::Last(Duration::hours(24))
    );
    assert_eq!(
        "7d".parse::<TimeWindow>().unwrap(),
        TimeWindow::Last(Duration::days(7))
    );
    assert!("yesterday".parse::<TimeWindow>().is_err());
    assert!("10x".parse::<TimeWindow>().is_err());
    assert!("".parse::<TimeWindow>().is_err());
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[test]
fn regex_search_matches_summary_session_and_payload() {
    let events = vec![
        ingest(
            WireEvent::new("PostToolUse", "alpha-1", "agent-a").summary("compiled the parser"),
        ),
        ingest(WireEvent::new("PostToolUse", "builder-7", "agent-b")),
        ingest(
            WireEvent::new("PostToolUse", "gamma-2", "agent-c")
                .payload(json!({"tool": "cargo", "target": "parser"})),
        ),
        ingest(WireEvent::new("PostToolUse", "delta-3", "agent-d").summary("unrelated")),
    ];

    let criteria = FilterCriteria::new().search(r"parser|builder-\d+").regex(true);
    let kept = apply(&events, &criteria, now());

    assert_eq!(kept.len(), 3);
}

#[test]
fn regex_search_is_case_insensitive() {
    let events = vec![ingest(
        WireEvent::new("Stop", "alpha-1", "agent-a").summary("Compacting Context"),
    )];

    let criteria = FilterCriteria::new().search("compacting").regex(true);
    assert_eq!(apply(&events, &criteria, now()).len(), 1);
}

#[test]
fn invalid_regex_degrades_to_substring_match() {
    let events = vec![
        ingest(WireEvent::new("Stop", "alpha-1", "agent-a").summary("matched [invalid( literally")),
        ingest(WireEvent::new("Stop", "alpha-2", "agent-a").summary("no such text")),
    ];

    // "[invalid(" cannot compile as a regex; must not panic or error.
    let criteria = FilterCriteria::new().search("[invalid(").regex(true);
    let kept = apply(&events, &criteria, now());

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].session_id, "alpha-1");
}

#[test]
fn plain_search_is_case_insensitive_substring() {
    let events = vec![
        ingest(WireEvent::new("Stop", "alpha-1", "agent-a").summary("Deployed to STAGING")),
        ingest(WireEvent::new("Stop", "alpha-2", "agent-a").summary("local run")),
    ];

    let criteria = FilterCriteria::new().search("staging");
    assert_eq!(apply(&events, &criteria, now()).len(), 1);
}

// ---------------------------------------------------------------------------
// Categorical and multi-select criteria
// ---------------------------------------------------------------------------

#[test]
fn categorical_fields_use_exact_equality() {
    let events = vec![
        ingest(WireEvent::new("PreToolUse", "alpha-1", "agent-a")),
        ingest(WireEvent::new("PostToolUse", "alpha-1", "agent-aa")),
        ingest(WireEvent::new("PostToolUse", "alpha-2", "agent-a")),
    ];

    let by_app = FilterCriteria::new().app("agent-a");
    assert_eq!(apply(&events, &by_app, now()).len(), 2);

    let by_session = FilterCriteria::new().session("alpha-1");
    assert_eq!(apply(&events, &by_session, now()).len(), 2);

    let by_kind = FilterCriteria::new().event_type("PostToolUse");
    assert_eq!(apply(&events, &by_kind, now()).len(), 2);

    let combined = FilterCriteria::new().app("agent-a").event_type("PostToolUse");
    let kept = apply(&events, &combined, now());
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].session_id, "alpha-2");
}

#[test]
fn multi_select_sets_widen_within_a_dimension() {
    let events = vec![
        ingest(WireEvent::new("PreToolUse", "alpha-1", "agent-a")),
        ingest(WireEvent::new("Stop", "beta-1", "agent-b")),
        ingest(WireEvent::new("Notification", "gamma-1", "agent-c")),
    ];

    let kinds = FilterCriteria::new()
        .with_event_type("PreToolUse")
        .with_event_type("Stop");
    assert_eq!(apply(&events, &kinds, now()).len(), 2);

    let agents = FilterCriteria::new().with_agent("alpha").with_agent("gamma");
    assert_eq!(apply(&events, &agents, now()).len(), 2);
}

#[test]
fn empty_criteria_match_everything() {
    let events = vec![
        ingest(WireEvent::new("Stop", "alpha-1", "agent-a")),
        ingest(WireEvent::new("Stop", "beta-1", "agent-b")),
    ];

    assert_eq!(apply(&events, &FilterCriteria::new(), now()).len(), 2);
}

// ---------------------------------------------------------------------------
// Project derivation
// ---------------------------------------------------------------------------

#[test]
fn project_comes_from_session_prefix_first() {
    let event = ingest(WireEvent::new("Stop", "Garden-42", "agent-a"));
    assert_eq!(derive_project(&event).as_deref(), Some("garden"));
}

#[test]
fn project_falls_back_to_payload() {
    let event = ingest(
        WireEvent::new("Stop", "123-no-prefix", "multi-part-app")
            .payload(json!({"project": "  Greenhouse "})),
    );
    assert_eq!(derive_project(&event).as_deref(), Some("greenhouse"));

    let nested = ingest(
        WireEvent::new("Stop", "99", "multi-part-app")
            .payload(json!({"context": {"project": "Orchard"}})),
    );
    assert_eq!(derive_project(&nested).as_deref(), Some("orchard"));
}

#[test]
fn project_falls_back_to_simple_app_name() {
    let event = ingest(WireEvent::new("Stop", "777", "dashboard"));
    assert_eq!(derive_project(&event).as_deref(), Some("dashboard"));
}

#[test]
fn hyphenated_and_reserved_apps_yield_no_project() {
    let hyphenated = ingest(WireEvent::new("Stop", "42", "agent-a"));
    assert_eq!(derive_project(&hyphenated), None);

    let reserved = ingest(WireEvent::new("Stop", "42", "orchestrator"));
    assert_eq!(derive_project(&reserved), None);
}

#[test]
fn project_criterion_filters_on_derived_value() {
    let events = vec![
        ingest(WireEvent::new("Stop", "garden-1", "agent-a")),
        ingest(WireEvent::new("Stop", "kitchen-1", "agent-a")),
    ];

    let criteria = FilterCriteria::new().project("garden");
    let kept = apply(&events, &criteria, now());
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].session_id, "garden-1");
}
