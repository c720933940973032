//! Read-only collaborator endpoints.
//!
//! The collaborator API serves an initial event backfill plus a handful of
//! snapshots (aggregate stats, retention policy, known apps and sessions).
//! Everything here is best-effort; callers log failures and carry on.

use serde_json::Value;

use crate::error::Result;
use crate::model::WireEvent;

pub struct PollClient {
    http: reqwest::Client,
    base: String,
}

impl PollClient {
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    /// The most recent events, newest first.
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<WireEvent>> {
        let url = format!("{}/events/recent?limit={limit}", self.base);
        Ok(self.get(&url).await?.json().await?)
    }

    /// Server-side aggregate stats snapshot. Shape is the server's own;
    /// treated as opaque.
    pub async fn stats_snapshot(&self) -> Result<Value> {
        let url = format!("{}/stats", self.base);
        Ok(self.get(&url).await?.json().await?)
    }

    /// The server's event retention policy value.
    pub async fn retention_policy(&self) -> Result<Value> {
        let url = format!("{}/retention", self.base);
        Ok(self.get(&url).await?.json().await?)
    }

    /// Apps the server has ever seen.
    pub async fn known_apps(&self) -> Result<Vec<String>> {
        let url = format!("{}/apps", self.base);
        Ok(self.get(&url).await?.json().await?)
    }

    /// Session ids the server has ever seen.
    pub async fn known_sessions(&self) -> Result<Vec<String>> {
        let url = format!("{}/sessions", self.base);
        Ok(self.get(&url).await?.json().await?)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        Ok(self.http.get(url).send().await?.error_for_status()?)
    }
}
