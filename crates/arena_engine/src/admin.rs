//! Administrative player controls: freeze, vanish, event bans and the
//! join whitelist.

use std::collections::HashSet;

use arena_core::PlayerId;
use tracing::info;

/// Admin flag sets and whitelist mode.
#[derive(Debug, Default)]
pub struct AdminControls {
    frozen: HashSet<PlayerId>,
    vanished: HashSet<PlayerId>,
    banned: HashSet<PlayerId>,
    whitelist_enabled: bool,
    whitelisted: HashSet<PlayerId>,
}

fn set_flag(set: &mut HashSet<PlayerId>, player: PlayerId, on: bool) -> bool {
    if on {
        set.insert(player)
    } else {
        set.remove(&player)
    }
}

impl AdminControls {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze or unfreeze a player. Returns `true` if the flag changed.
    pub fn freeze(&mut self, player: PlayerId, on: bool) -> bool {
        let changed = set_flag(&mut self.frozen, player, on);
        if changed {
            info!(%player, frozen = on, "freeze toggled");
        }
        changed
    }

    /// Hide or reveal a player. Returns `true` if the flag changed.
    pub fn vanish(&mut self, player: PlayerId, on: bool) -> bool {
        let changed = set_flag(&mut self.vanished, player, on);
        if changed {
            info!(%player, vanished = on, "vanish toggled");
        }
        changed
    }

    /// Ban or unban a player from the event. Returns `true` if the flag
    /// changed.
    pub fn ban(&mut self, player: PlayerId, on: bool) -> bool {
        let changed = set_flag(&mut self.banned, player, on);
        if changed {
            info!(%player, banned = on, "event ban toggled");
        }
        changed
    }

    /// Turn whitelist mode on or off.
    pub fn set_whitelist(&mut self, enabled: bool) {
        self.whitelist_enabled = enabled;
        info!(enabled, "whitelist mode set");
    }

    /// Add or remove a player from the whitelist.
    pub fn whitelist(&mut self, player: PlayerId, on: bool) -> bool {
        set_flag(&mut self.whitelisted, player, on)
    }

    #[must_use]
    pub fn is_frozen(&self, player: PlayerId) -> bool {
        self.frozen.contains(&player)
    }

    #[must_use]
    pub fn is_vanished(&self, player: PlayerId) -> bool {
        self.vanished.contains(&player)
    }

    #[must_use]
    pub fn is_banned(&self, player: PlayerId) -> bool {
        self.banned.contains(&player)
    }

    #[must_use]
    pub fn whitelist_enabled(&self) -> bool {
        self.whitelist_enabled
    }

    /// Not banned, and whitelisted when whitelist mode is on.
    #[must_use]
    pub fn can_join(&self, player: PlayerId) -> bool {
        !self.is_banned(player) && (!self.whitelist_enabled || self.whitelisted.contains(&player))
    }
}
