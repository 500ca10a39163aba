//! NATS subject hierarchy.
//!
//! All subjects are prefixed with `arena.` to namespace within a shared NATS
//! cluster.

/// Root prefix for all arena NATS subjects.
pub const PREFIX: &str = "arena";

/// Stimuli for the engine. Host server → Engine.
pub const STIMULUS: &str = "arena.stimulus";

/// Stats snapshot request/reply. Any → Engine.
pub const QUERY_STATS: &str = "arena.query.stats";

/// Wildcard matching every outbound event subject.
pub const EVENT_WILDCARD: &str = "arena.event.>";

/// Build the subject an outbound event of the given kind is published on.
///
/// `arena.event.<kind>`
#[must_use]
pub fn event(kind: &str) -> String {
    format!("arena.event.{kind}")
}
