//! # arena_core
//!
//! Shared vocabulary of the match orchestration engine.
//!
//! This crate provides:
//!
//! - [`PlayerId`] / [`PartyId`]: identifiers.
//! - [`Timestamp`]: engine clock in milliseconds since the engine epoch.
//! - [`Inbound`] / [`Outbound`]: stimuli consumed and events emitted.
//! - [`PersistedRecord`]: the per-player layout owned by the external store.

pub mod events;
pub mod ids;
pub mod record;
pub mod time;

pub use events::{AdminCommand, DamageCause, Inbound, MatchMode, Outbound, PartyCommand, Winner};
pub use ids::{PartyId, PlayerId};
pub use record::{LOADOUT_SLOTS, PersistedRecord};
pub use time::Timestamp;
