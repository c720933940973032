//! The watch loop: wires the stream into intake and staging, and owns
//! every timer.
//!
//! One task owns all mutable state (buffer, stage) and multiplexes stream
//! messages, the promotion tick, the earliest slot-expiry deadline, the
//! stats poll, and shutdown through a single `select!`. Each arm runs to
//! completion before the next fires, so the buffer keeps its single-writer
//! property without locks, and every timer dies with the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Tuning;
use crate::error::Result;
use crate::ingest::EventBuffer;
use crate::model::WireMessage;
use crate::poll::PollClient;
use crate::stage::{Stage, StageConfig};
use crate::stream::StreamClient;

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Period between promotion attempts.
    pub spawn_interval: Duration,
    /// Period between stats-snapshot polls.
    pub stats_poll_interval: Duration,
    /// How many events to request for the initial backfill.
    pub backfill_limit: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            spawn_interval: Duration::from_millis(4_000),
            stats_poll_interval: Duration::from_millis(5_000),
            backfill_limit: 100,
        }
    }
}

impl From<&Tuning> for WatchConfig {
    fn from(tuning: &Tuning) -> Self {
        Self {
            spawn_interval: tuning.spawn_interval(),
            stats_poll_interval: tuning.stats_poll_interval(),
            backfill_limit: tuning.backfill_limit,
        }
    }
}

/// Owns the full pipeline state for one running instance.
pub struct Watcher {
    buffer: EventBuffer,
    stage: Stage,
    stream: StreamClient,
    poll: PollClient,
    config: WatchConfig,
    shutdown: Arc<Notify>,
}

impl Watcher {
    pub fn new(stream: StreamClient, poll: PollClient, tuning: &Tuning) -> Self {
        Self {
            buffer: EventBuffer::new(tuning.buffer_capacity),
            stage: Stage::new(StageConfig {
                max_concurrent: tuning.max_concurrent,
                min_concurrent: tuning.min_concurrent,
                active_lifetime: tuning.active_lifetime(),
            }),
            stream,
            poll,
            config: WatchConfig::from(tuning),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle for asking the loop to stop (e.g. from a ctrl-c task).
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Run until shutdown. Collaborator failures are logged, never fatal.
    pub async fn run(&mut self) -> Result<()> {
        self.startup_fetch().await;

        // Intervals start one period out, matching the source's timers;
        // missed ticks are skipped so promotions stay a steady trickle.
        let mut promote = tokio::time::interval_at(
            Instant::now() + self.config.spawn_interval,
            self.config.spawn_interval,
        );
        promote.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats = tokio::time::interval_at(
            Instant::now() + self.config.stats_poll_interval,
            self.config.stats_poll_interval,
        );
        stats.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("watch loop started");

        loop {
            let next_expiry = self.stage.next_expiry();

            tokio::select! {
                _ = self.shutdown.notified() => {
                    self.stream.shutdown();
                    info!("watch loop shutting down");
                    return Ok(());
                }
                msg = self.stream.recv() => match msg {
                    Some(WireMessage::Handshake(h)) => {
                        info!(kind = %h.kind, message = %h.message, "stream handshake");
                    }
                    Some(WireMessage::Event(wire)) => {
                        if let Some(event) = self.buffer.ingest(wire) {
                            debug!(id = %event.id, app = %event.app, kind = %event.kind, "event ingested");
                            self.stage.enqueue(event);
                        }
                    }
                    None => {
                        warn!("stream supervisor exited");
                        return Ok(());
                    }
                },
                _ = promote.tick() => {
                    if let Some(slot) = self.stage.tick(Utc::now()) {
                        info!(
                            lane = slot.lane,
                            app = %slot.event.app,
                            kind = %slot.event.kind,
                            active = self.stage.active().len(),
                            "slot promoted"
                        );
                    }
                }
                _ = sleep_until(next_expiry) => {
                    for slot in self.stage.expire_due(Utc::now()) {
                        debug!(lane = slot.lane, id = %slot.event.id, "slot expired");
                    }
                }
                _ = stats.tick() => {
                    match self.poll.stats_snapshot().await {
                        Ok(snapshot) => debug!(%snapshot, "stats snapshot"),
                        Err(e) => warn!("stats poll failed: {e}"),
                    }
                }
            }
        }
    }

    /// One-time startup fetches: backfill, stats, retention, enumerations.
    async fn startup_fetch(&mut self) {
        match self.poll.recent_events(self.config.backfill_limit).await {
            Ok(mut events) => {
                // The API returns newest first; ingest oldest first so the
                // buffer comes out in arrival order.
                events.reverse();
                let mut accepted = 0usize;
                for wire in events {
                    if let Some(event) = self.buffer.ingest(wire) {
                        self.stage.enqueue(event);
                        accepted += 1;
                    }
                }
                info!(accepted, "backfill loaded");
            }
            Err(e) => warn!("backfill unavailable: {e}"),
        }

        match self.poll.stats_snapshot().await {
            Ok(snapshot) => debug!(%snapshot, "initial stats snapshot"),
            Err(e) => warn!("stats snapshot unavailable: {e}"),
        }
        match self.poll.retention_policy().await {
            Ok(policy) => info!(%policy, "server retention policy"),
            Err(e) => warn!("retention policy unavailable: {e}"),
        }
        match self.poll.known_apps().await {
            Ok(apps) => info!(count = apps.len(), "known apps"),
            Err(e) => warn!("app enumeration unavailable: {e}"),
        }
        match self.poll.known_sessions().await {
            Ok(sessions) => info!(count = sessions.len(), "known sessions"),
            Err(e) => warn!("session enumeration unavailable: {e}"),
        }
    }
}

/// Sleep until a deadline, or forever when there is none. Recomputed every
/// loop pass, so a newly promoted slot re-arms it.
async fn sleep_until(deadline: Option<DateTime<Utc>>) {
    match deadline {
        Some(at) => {
            let delta = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(delta).await;
        }
        None => std::future::pending::<()>().await,
    }
}
