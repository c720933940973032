//! Filtering: criteria application and derived groupings.
//!
//! All functions here are pure over the event set. Views are recomputed on
//! every criteria or buffer change; nothing is cached.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::model::{Event, FilterCriteria};

static PROJECT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)").expect("literal pattern"));

/// App names that never stand in as a project.
const RESERVED_APPS: [&str; 2] = ["orchestrator", "unknown"];

/// Apply criteria to an event set, newest-first order preserved.
pub fn apply<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> Vec<Event> {
    let cutoff = criteria.window.cutoff(now);
    events
        .into_iter()
        .filter(|event| matches(event, criteria, cutoff))
        .cloned()
        .collect()
}

fn matches(event: &Event, criteria: &FilterCriteria, cutoff: Option<DateTime<Utc>>) -> bool {
    if let Some(ref project) = criteria.project {
        if derive_project(event).as_deref() != Some(project.as_str()) {
            return false;
        }
    }
    if let Some(ref app) = criteria.app {
        if event.app != *app {
            return false;
        }
    }
    if let Some(ref session_id) = criteria.session_id {
        if event.session_id != *session_id {
            return false;
        }
    }
    if let Some(ref kind) = criteria.event_type {
        if event.kind.as_str() != kind {
            return false;
        }
    }
    if !criteria.event_types.is_empty() && !criteria.event_types.contains(event.kind.as_str()) {
        return false;
    }
    if !criteria.agents.is_empty() && !criteria.agents.contains(event.agent()) {
        return false;
    }
    // Events whose timestamp did not parse are retained under any window.
    if let (Some(cutoff), Some(ts)) = (cutoff, event.timestamp) {
        if ts < cutoff {
            return false;
        }
    }
    if let Some(ref needle) = criteria.search {
        if !needle.is_empty() && !search_matches(event, needle, criteria.regex_mode) {
            return false;
        }
    }
    true
}

/// The project an event belongs to.
///
/// Derived from the leading alphabetic prefix of the session id, falling
/// back to `payload.project` / `payload.context.project`, falling back to
/// the app name when it contains no hyphen and is not a reserved value.
/// All branches normalize to lower case.
pub fn derive_project(event: &Event) -> Option<String> {
    if let Some(caps) = PROJECT_PREFIX.captures(&event.session_id) {
        return Some(caps[1].to_lowercase());
    }

    let payload_project = event
        .payload
        .get("project")
        .or_else(|| event.payload.get("context").and_then(|c| c.get("project")))
        .and_then(|v| v.as_str());
    if let Some(p) = payload_project {
        let p = p.trim().to_lowercase();
        if !p.is_empty() {
            return Some(p);
        }
    }

    let app = event.app.as_str();
    if !app.contains('-') && !RESERVED_APPS.contains(&app) {
        return Some(app.to_lowercase());
    }
    None
}

/// Free-text matching over summary, session id, and stringified payload.
///
/// In regex mode the needle is compiled case-insensitively; a pattern that
/// fails to compile silently degrades to plain substring matching.
fn search_matches(event: &Event, needle: &str, regex_mode: bool) -> bool {
    let payload_text = event.payload.to_string();
    let haystacks = [
        event.summary.as_deref().unwrap_or(""),
        event.session_id.as_str(),
        payload_text.as_str(),
    ];

    if regex_mode {
        match RegexBuilder::new(needle).case_insensitive(true).build() {
            Ok(re) => return haystacks.iter().any(|h| re.is_match(h)),
            Err(_) => {
                debug!(pattern = %needle, "invalid search pattern, using substring match");
            }
        }
    }

    let needle = needle.to_lowercase();
    haystacks.iter().any(|h| h.to_lowercase().contains(&needle))
}
