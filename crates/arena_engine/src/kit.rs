//! Kit cooldown gate and loadout catalog.
//!
//! A grant is allowed once `now >= kit_cooldown_expiry`; a successful grant
//! pushes the expiry forward by the alive or spectator cooldown. Forced
//! grants (auto-reissue after deaths) bypass the gate and leave the expiry
//! where it is.

use std::collections::BTreeSet;
use std::time::Duration;

use arena_core::{LOADOUT_SLOTS, PlayerId, Timestamp};
use tracing::{debug, info};

use crate::config::KitConfig;
use crate::error::EngineError;
use crate::registry::PlayerRegistry;

/// Cooldown gate plus the set of grantable loadouts.
#[derive(Debug)]
pub struct KitGate {
    config: KitConfig,
    catalog: BTreeSet<String>,
}

impl KitGate {
    #[must_use]
    pub fn new(config: KitConfig) -> Self {
        let catalog = config.loadouts.iter().map(|name| name.to_lowercase()).collect();
        Self { config, catalog }
    }

    /// Add a loadout to the catalog at runtime. Names are case-insensitive.
    /// Returns `false` for an empty name or one already known.
    pub fn add_loadout(&mut self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return false;
        }
        self.catalog.insert(name)
    }

    /// Returns an iterator over the catalog, in name order.
    pub fn loadouts(&self) -> impl Iterator<Item = &str> {
        self.catalog.iter().map(String::as_str)
    }

    /// Cooldown applied after a grant.
    #[must_use]
    pub fn cooldown_for(&self, spectator: bool) -> Duration {
        let secs = if spectator {
            self.config.cooldown_spectator_secs
        } else {
            self.config.cooldown_alive_secs
        };
        Duration::from_secs(secs)
    }

    /// Returns `true` once the player's cooldown has elapsed.
    #[must_use]
    pub fn can_use(registry: &PlayerRegistry, player: PlayerId, now: Timestamp) -> bool {
        registry
            .get(player)
            .is_none_or(|state| now >= state.kit_cooldown_expiry)
    }

    /// Time left before the player may take another loadout.
    #[must_use]
    pub fn remaining(registry: &PlayerRegistry, player: PlayerId, now: Timestamp) -> Duration {
        registry
            .get(player)
            .map_or(Duration::ZERO, |state| now.until(state.kit_cooldown_expiry))
    }

    /// Grant `loadout` to `player`.
    ///
    /// Returns the normalised loadout name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingResource`] for an unknown loadout and
    /// [`EngineError::CooldownActive`] if a non-forced grant is still gated.
    pub fn grant(
        &self,
        registry: &mut PlayerRegistry,
        player: PlayerId,
        loadout: &str,
        now: Timestamp,
        forced: bool,
    ) -> Result<String, EngineError> {
        let name = loadout.to_lowercase();
        if !self.catalog.contains(&name) {
            return Err(EngineError::MissingResource(format!("loadout {loadout}")));
        }

        if forced {
            info!(%player, loadout = %name, "loadout reissued");
            return Ok(name);
        }

        if !Self::can_use(registry, player, now) {
            let remaining = Self::remaining(registry, player, now);
            return Err(EngineError::CooldownActive {
                remaining_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            });
        }

        let state = registry.entry(player);
        let cooldown = self.cooldown_for(state.is_spectator);
        state.kit_cooldown_expiry = now.after(cooldown);
        debug!(%player, loadout = %name, cooldown_ms = cooldown.as_millis() as u64, "loadout granted");
        Ok(name)
    }

    /// Clear the player's cooldown.
    pub fn reset(registry: &mut PlayerRegistry, player: PlayerId) {
        registry.entry(player).kit_cooldown_expiry = Timestamp::ZERO;
    }

    /// Store `loadout` in one of the player's slots. An empty name clears
    /// the slot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingResource`] for a slot out of range or an
    /// unknown loadout.
    pub fn select(
        &self,
        registry: &mut PlayerRegistry,
        player: PlayerId,
        slot: usize,
        loadout: &str,
    ) -> Result<(), EngineError> {
        if slot >= LOADOUT_SLOTS {
            return Err(EngineError::MissingResource(format!("loadout slot {slot}")));
        }
        let name = loadout.to_lowercase();
        if !name.is_empty() && !self.catalog.contains(&name) {
            return Err(EngineError::MissingResource(format!("loadout {loadout}")));
        }
        registry.entry(player).loadouts[slot] = name;
        Ok(())
    }

    /// Whether a death count triggers an automatic reissue.
    ///
    /// Fires at every multiple of the configured death count.
    #[must_use]
    pub fn should_reissue(&self, event_deaths: u32) -> bool {
        let every = self.config.auto_reissue_deaths;
        self.config.auto_reissue_enabled
            && every > 0
            && event_deaths >= every
            && event_deaths % every == 0
    }

    /// Delay between the death and the reissue.
    #[must_use]
    pub fn reissue_delay(&self) -> Duration {
        Duration::from_millis(self.config.reissue_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u128) -> PlayerId {
        PlayerId::from_u128(n)
    }

    fn gate() -> KitGate {
        KitGate::new(KitConfig {
            loadouts: vec!["archer".to_string(), "tank".to_string()],
            ..KitConfig::default()
        })
    }

    #[test]
    fn test_cooldown_window() {
        let gate = gate();
        let mut registry = PlayerRegistry::new();
        let t = Timestamp::from_secs(100);

        gate.grant(&mut registry, pid(1), "archer", t, false).unwrap();

        assert!(!KitGate::can_use(&registry, pid(1), t));
        assert!(!KitGate::can_use(&registry, pid(1), Timestamp::from_millis(144_999)));
        assert!(KitGate::can_use(&registry, pid(1), Timestamp::from_secs(145)));
        assert!(KitGate::can_use(&registry, pid(1), Timestamp::from_secs(500)));
    }

    #[test]
    fn test_grant_during_cooldown_fails() {
        let gate = gate();
        let mut registry = PlayerRegistry::new();
        gate.grant(&mut registry, pid(1), "archer", Timestamp::ZERO, false)
            .unwrap();
        let err = gate
            .grant(&mut registry, pid(1), "tank", Timestamp::from_secs(40), false)
            .unwrap_err();
        assert_eq!(err, EngineError::CooldownActive { remaining_ms: 5000 });
        assert_eq!(
            registry.get(pid(1)).unwrap().kit_cooldown_expiry,
            Timestamp::from_secs(45)
        );
    }

    #[test]
    fn test_spectator_cooldown_is_zero() {
        let gate = gate();
        let mut registry = PlayerRegistry::new();
        registry.entry(pid(1)).is_spectator = true;
        gate.grant(&mut registry, pid(1), "archer", Timestamp::ZERO, false)
            .unwrap();
        assert!(KitGate::can_use(&registry, pid(1), Timestamp::ZERO));
    }

    #[test]
    fn test_forced_grant_bypasses_and_keeps_expiry() {
        let gate = gate();
        let mut registry = PlayerRegistry::new();
        gate.grant(&mut registry, pid(1), "archer", Timestamp::ZERO, false)
            .unwrap();
        gate.grant(&mut registry, pid(1), "tank", Timestamp::from_secs(1), true)
            .unwrap();
        assert_eq!(
            registry.get(pid(1)).unwrap().kit_cooldown_expiry,
            Timestamp::from_secs(45)
        );
    }

    #[test]
    fn test_unknown_loadout_rejected() {
        let gate = gate();
        let mut registry = PlayerRegistry::new();
        assert!(matches!(
            gate.grant(&mut registry, pid(1), "wizard", Timestamp::ZERO, false),
            Err(EngineError::MissingResource(_))
        ));
        assert!(registry.get(pid(1)).is_none());
    }

    #[test]
    fn test_reset_clears_cooldown() {
        let gate = gate();
        let mut registry = PlayerRegistry::new();
        gate.grant(&mut registry, pid(1), "archer", Timestamp::ZERO, false)
            .unwrap();
        KitGate::reset(&mut registry, pid(1));
        assert!(KitGate::can_use(&registry, pid(1), Timestamp::from_secs(1)));
    }

    #[test]
    fn test_select_slots() {
        let mut gate = gate();
        let mut registry = PlayerRegistry::new();
        gate.select(&mut registry, pid(1), 0, "Archer").unwrap();
        assert_eq!(registry.get(pid(1)).unwrap().loadouts[0], "archer");
        assert!(gate.select(&mut registry, pid(1), 3, "archer").is_err());
        assert!(gate.select(&mut registry, pid(1), 1, "wizard").is_err());

        assert!(gate.add_loadout("Wizard"));
        assert!(!gate.add_loadout("wizard"));
        assert!(!gate.add_loadout("  "));
        gate.select(&mut registry, pid(1), 1, "wizard").unwrap();
        gate.select(&mut registry, pid(1), 0, "").unwrap();
        assert!(registry.get(pid(1)).unwrap().loadouts[0].is_empty());
    }

    #[test]
    fn test_reissue_on_every_multiple() {
        let gate = KitGate::new(KitConfig {
            auto_reissue_enabled: true,
            ..KitConfig::default()
        });
        let fired: Vec<u32> = (1..=9).filter(|d| gate.should_reissue(*d)).collect();
        assert_eq!(fired, vec![3, 6, 9]);
        assert!(!KitGate::new(KitConfig::default()).should_reissue(3));
    }
}
