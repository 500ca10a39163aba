//! # arena_engine
//!
//! Authoritative match engine for an arena-style elimination event.
//!
//! This crate provides:
//!
//! - [`engine`]: the composition root that owns all match state.
//! - [`session`]: lifecycle state machine and rosters.
//! - [`registry`]: per-player stats, elimination bookkeeping, leaderboards.
//! - [`party`]: party groups and invitations.
//! - [`combat`]: damage gating, combat tags and logout policy.
//! - [`kit`]: loadout selection and cooldowns.
//! - [`border`]: the shrinking border sequence.
//! - [`surge`]: surge pressure pulses.
//! - [`win`]: win condition evaluation.
//! - [`admin`]: freeze, vanish, ban and whitelist controls.
//! - [`scheduler`] / [`task`]: timers run on the authority task.
//! - [`snapshot`]: read-only stats view for other tasks.
//! - [`store`]: persistence of player records.
//! - [`tick`]: the fixed-timestep loop that drives the engine.
//! - [`bridge`]: NATS tasks feeding and reading the loop.
//! - [`config`]: lenient JSON configuration.

pub mod admin;
pub mod border;
pub mod bridge;
pub mod combat;
pub mod config;
pub mod engine;
pub mod error;
pub mod kit;
pub mod party;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod surge;
pub mod task;
pub mod tick;
pub mod win;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, StoreError};
pub use snapshot::StatsSnapshot;
