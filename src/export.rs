//! Export of filtered event sets as CSV or JSON.

use crate::error::{Error, Result};
use crate::model::Event;

/// CSV with one row per event. Tool and params come out of the opaque
/// payload when present.
pub fn to_csv(events: &[Event]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Timestamp",
        "SessionID",
        "App",
        "EventType",
        "Summary",
        "Tool",
        "Params",
    ])?;

    for event in events {
        let tool = event
            .payload
            .get("tool")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let params = event
            .payload
            .get("params")
            .map(|v| v.to_string())
            .unwrap_or_default();
        writer.write_record([
            event.timestamp_raw.as_str(),
            event.session_id.as_str(),
            event.app.as_str(),
            event.kind.as_str(),
            event.summary.as_deref().unwrap_or(""),
            tool,
            params.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Other(format!("csv writer: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Other(format!("csv not utf-8: {e}")))
}

/// JSON as a direct serialization of the filtered event array.
pub fn to_json(events: &[Event]) -> Result<String> {
    Ok(serde_json::to_string_pretty(events)?)
}
