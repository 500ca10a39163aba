//! Timer callbacks owned by the engine scheduler.

use arena_core::PlayerId;

/// A deferred piece of engine work. Tasks are plain values; the engine
/// interprets them when the scheduler reports them due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTask {
    /// The grace period has run out.
    GraceExpired,
    /// Apply the next border phase.
    BorderAdvance,
    /// Check whether the session has a winner.
    EvaluateWin,
    /// Periodic win check.
    WinSweep,
    /// Apply surge pressure.
    SurgePulse,
    /// Force-grant the player's first loadout slot.
    ReissueLoadout(PlayerId),
    /// Panics when dispatched.
    #[cfg(test)]
    Explode,
}
