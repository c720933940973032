//! Typed configuration.
//!
//! Endpoints and log level come from environment variables with local-dev
//! defaults. Scheduler and stream tuning comes from an optional TOML file;
//! every knob has a default matching the deployed behavior.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket endpoint delivering the event stream.
    pub stream_url: String,
    /// Base URL of the collaborator API (backfill, stats, enumerations).
    pub api_url: String,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this. Every
    /// variable has a default suited to a local single-peer deployment.
    pub fn from_env() -> Self {
        Self {
            stream_url: std::env::var("SWARMWATCH_STREAM_URL")
                .unwrap_or_else(|_| "ws://localhost:4000/stream".to_string()),
            api_url: std::env::var("SWARMWATCH_API_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

/// Behavioral tuning, loadable from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tuning {
    /// Event buffer capacity; oldest entries are evicted beyond this.
    pub buffer_capacity: usize,
    /// Upper bound on concurrently staged slots.
    pub max_concurrent: usize,
    /// Lower bound on staged slots. Carried in configuration; promotion
    /// logic does not consult it.
    pub min_concurrent: usize,
    /// Milliseconds between promotion ticks.
    pub spawn_interval_ms: u64,
    /// Milliseconds a slot stays active before expiry.
    pub active_lifetime_ms: u64,
    /// Milliseconds between reconnection attempts.
    pub reconnect_delay_ms: u64,
    /// Milliseconds between stats-snapshot polls.
    pub stats_poll_interval_ms: u64,
    /// How many events to request for the initial backfill.
    pub backfill_limit: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            buffer_capacity: 500,
            max_concurrent: 7,
            min_concurrent: 2,
            spawn_interval_ms: 4_000,
            active_lifetime_ms: 30_000,
            reconnect_delay_ms: 3_000,
            stats_poll_interval_ms: 5_000,
            backfill_limit: 100,
        }
    }
}

impl Tuning {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("bad tuning file {}: {e}", path.display())))
    }

    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms)
    }

    pub fn active_lifetime(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.active_lifetime_ms as i64)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn stats_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stats_poll_interval_ms)
    }
}
