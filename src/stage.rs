//! Presentation staging: bounded-concurrency promotion of queued events
//! into lanes.
//!
//! The stage is a pure state machine over a clock passed in by the caller.
//! The watch loop drives `tick` on its promotion interval and `expire_due`
//! on slot deadlines; tests drive both directly.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::model::{Event, Slot};

/// Number of discrete lanes available to active slots.
pub const LANE_COUNT: u8 = 8;

#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Upper bound on concurrently active slots.
    pub max_concurrent: usize,
    /// Lower bound on active slots. Carried in configuration; promotion
    /// logic does not consult it.
    pub min_concurrent: usize,
    /// How long a slot stays active before expiry.
    pub active_lifetime: chrono::Duration,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 7,
            min_concurrent: 2,
            active_lifetime: chrono::Duration::seconds(30),
        }
    }
}

/// Queued → Active → Expired, one event at a time.
pub struct Stage {
    config: StageConfig,
    /// Validated events awaiting promotion, strict FIFO.
    pending: VecDeque<Event>,
    /// Currently live slots. Never exceeds `max_concurrent`.
    active: Vec<Slot>,
    /// Every slot ever created, in creation order. Never trimmed; a
    /// long-running instance grows this without bound (see DESIGN.md).
    history: Vec<Slot>,
}

impl Stage {
    pub fn new(config: StageConfig) -> Self {
        Self {
            config,
            pending: VecDeque::new(),
            active: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Queue a validated event for promotion.
    pub fn enqueue(&mut self, event: Event) {
        self.pending.push_back(event);
    }

    /// One promotion attempt. Promotes at most one event per call, even
    /// when several slots are free — queued work drains as a steady
    /// trickle, not a burst.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Slot> {
        if self.active.len() >= self.config.max_concurrent {
            return None;
        }
        let event = self.pending.pop_front()?;

        let slot = Slot {
            event,
            lane: self.pick_lane(),
            spawned_at: now,
            expires_at: now + self.config.active_lifetime,
        };

        self.active.push(slot.clone());
        self.history.push(slot.clone());
        Some(slot)
    }

    /// Choose a lane uniformly at random among the unoccupied ones, or
    /// among all lanes when every lane is occupied (visual overlap is a
    /// degraded but non-fatal outcome).
    fn pick_lane(&self) -> u8 {
        let occupied: HashSet<u8> = self.active.iter().map(|s| s.lane).collect();
        let free: Vec<u8> = (0..LANE_COUNT).filter(|l| !occupied.contains(l)).collect();

        let mut rng = rand::thread_rng();
        if free.is_empty() {
            rng.gen_range(0..LANE_COUNT)
        } else {
            free[rng.gen_range(0..free.len())]
        }
    }

    /// Remove slots whose deadline has passed from the active set and
    /// return them. History is unaffected.
    pub fn expire_due(&mut self, now: DateTime<Utc>) -> Vec<Slot> {
        let (expired, live) = self
            .active
            .drain(..)
            .partition(|slot| slot.expires_at <= now);
        self.active = live;
        expired
    }

    /// The earliest active-slot deadline, if any slot is live.
    pub fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.active.iter().map(|slot| slot.expires_at).min()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn active(&self) -> &[Slot] {
        &self.active
    }

    pub fn history(&self) -> &[Slot] {
        &self.history
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new(StageConfig::default())
    }
}
