//! Combat tag tracker.
//!
//! A damaging hit between two eligible players tags both of them for a
//! fixed window. The window slides: a fresh hit resets the expiry to
//! `now + tag duration`, it never accumulates. Expiries live in the player
//! registry and are only ever compared against the clock, never cancelled.
//!
//! The tracker also remembers who last hit each player so that a combat
//! logout can credit the kill, and it decides what a disconnect during
//! combat means under the configured logout policy.

use std::collections::HashMap;
use std::time::Duration;

use arena_core::{DamageCause, PlayerId, Timestamp};
use serde::Serialize;
use tracing::debug;

use crate::config::CombatConfig;
use crate::registry::PlayerRegistry;

/// Why a damaging interaction was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuppressReason {
    TargetSpectator,
    TargetFrozen,
    SourceSpectator,
    SourceFrozen,
    GracePeriod,
    OutsideEvent,
    FriendlyFire,
}

/// Outcome of a damage check, returned to the host so it can cancel the hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DamageVerdict {
    Allowed,
    Suppressed(SuppressReason),
}

impl DamageVerdict {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Eligibility flags of one side of an interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Combatant {
    pub spectator: bool,
    pub frozen: bool,
}

/// Session-wide facts a damage check depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageContext {
    pub session_running: bool,
    pub grace_active: bool,
    pub same_party: bool,
    pub friendly_fire: bool,
}

/// What a disconnect during combat resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// Not in combat, or no policy applies.
    Clean,
    /// Flagged as a combat logout, no elimination.
    Flagged,
    /// Eliminated before the disconnect completes, crediting the last
    /// attacker if any.
    Eliminated { killer: Option<PlayerId> },
}

/// Tag window and last-attacker bookkeeping.
#[derive(Debug)]
pub struct CombatTracker {
    config: CombatConfig,
    last_attacker: HashMap<PlayerId, PlayerId>,
}

impl CombatTracker {
    #[must_use]
    pub fn new(config: CombatConfig) -> Self {
        Self {
            config,
            last_attacker: HashMap::new(),
        }
    }

    /// Returns the tag window length.
    #[must_use]
    pub fn tag_duration(&self) -> Duration {
        self.config.tag_duration()
    }

    /// Decide whether a player-on-player hit goes through.
    ///
    /// Checks run in a fixed order and the first failing one names the
    /// reason.
    #[must_use]
    pub fn check_attack(
        &self,
        target: Combatant,
        source: Combatant,
        ctx: DamageContext,
    ) -> DamageVerdict {
        use SuppressReason::*;

        let reason = if target.spectator {
            Some(TargetSpectator)
        } else if target.frozen {
            Some(TargetFrozen)
        } else if source.spectator {
            Some(SourceSpectator)
        } else if source.frozen {
            Some(SourceFrozen)
        } else if ctx.grace_active {
            Some(GracePeriod)
        } else if !ctx.session_running && self.config.disable_pvp_outside_event {
            Some(OutsideEvent)
        } else if ctx.same_party && !ctx.friendly_fire {
            Some(FriendlyFire)
        } else {
            None
        };

        reason.map_or(DamageVerdict::Allowed, DamageVerdict::Suppressed)
    }

    /// Decide whether environmental damage goes through. Void damage
    /// ignores the grace period.
    #[must_use]
    pub fn check_environment(
        &self,
        target: Combatant,
        cause: DamageCause,
        ctx: DamageContext,
    ) -> DamageVerdict {
        if target.spectator {
            DamageVerdict::Suppressed(SuppressReason::TargetSpectator)
        } else if ctx.grace_active && cause != DamageCause::Void {
            DamageVerdict::Suppressed(SuppressReason::GracePeriod)
        } else {
            DamageVerdict::Allowed
        }
    }

    /// Tag both players and remember the attacker. Returns the new expiry.
    pub fn tag(
        &mut self,
        registry: &mut PlayerRegistry,
        target: PlayerId,
        source: PlayerId,
        now: Timestamp,
    ) -> Timestamp {
        let expiry = now.after(self.tag_duration());
        registry.entry(target).combat_tag_expiry = expiry;
        registry.entry(source).combat_tag_expiry = expiry;
        self.last_attacker.insert(target, source);
        debug!(%target, %source, %expiry, "combat tag applied");
        expiry
    }

    /// Returns `true` while the player's tag has not expired.
    #[must_use]
    pub fn is_in_combat(registry: &PlayerRegistry, player: PlayerId, now: Timestamp) -> bool {
        registry
            .get(player)
            .is_some_and(|state| now < state.combat_tag_expiry)
    }

    /// Time left on the player's tag.
    #[must_use]
    pub fn remaining(registry: &PlayerRegistry, player: PlayerId, now: Timestamp) -> Duration {
        registry
            .get(player)
            .map_or(Duration::ZERO, |state| now.until(state.combat_tag_expiry))
    }

    /// Returns who last hit `player`.
    #[must_use]
    pub fn last_attacker(&self, player: PlayerId) -> Option<PlayerId> {
        self.last_attacker.get(&player).copied()
    }

    /// Resolve a disconnect under the logout policy.
    #[must_use]
    pub fn resolve_logout(
        &self,
        registry: &PlayerRegistry,
        player: PlayerId,
        now: Timestamp,
    ) -> LogoutOutcome {
        if !Self::is_in_combat(registry, player, now) || !self.config.prevent_logout {
            return LogoutOutcome::Clean;
        }
        if self.config.logout_kill {
            LogoutOutcome::Eliminated {
                killer: self.last_attacker(player),
            }
        } else {
            LogoutOutcome::Flagged
        }
    }

    /// Drop the attacker memory for a player (on elimination or disconnect).
    pub fn forget(&mut self, player: PlayerId) {
        self.last_attacker.remove(&player);
    }
}
