//! # swarmwatch
//!
//! Consumer/presenter of a live telemetry stream emitted by autonomous
//! agent processes.
//!
//! Four moving parts: a reconnecting stream client (`stream`), intake with
//! duplicate suppression and a bounded buffer (`ingest`), a
//! bounded-concurrency presentation stage with lanes and timed expiry
//! (`stage`), and a pure filter/aggregation engine (`filter`, `stats`).
//! The `watch` loop wires them together for the CLI.

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod model;
pub mod poll;
pub mod stage;
pub mod stats;
pub mod stream;
pub mod telemetry;
pub mod watch;
