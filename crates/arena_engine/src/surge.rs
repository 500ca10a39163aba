//! Surge monitor.
//!
//! While a session runs, alive players who have not consumed enough surge
//! resources take periodic damage. The pulse is a repeating scheduler timer
//! started with the session and cancelled when it stops.

use std::time::Duration;

use arena_core::{Outbound, PlayerId, Timestamp};
use tracing::{debug, info};

use crate::config::SurgeConfig;
use crate::registry::PlayerRegistry;
use crate::scheduler::{Scheduler, TimerId};
use crate::task::TimerTask;

#[derive(Debug)]
pub struct SurgeMonitor {
    config: SurgeConfig,
    pulse: Option<TimerId>,
}

impl SurgeMonitor {
    #[must_use]
    pub fn new(config: SurgeConfig) -> Self {
        Self {
            config,
            pulse: None,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    #[must_use]
    pub fn required_pops(&self) -> u32 {
        self.config.required_pops
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.pulse.is_some()
    }

    /// Arm the repeating pulse if enabled and not already armed.
    pub fn start(&mut self, scheduler: &mut Scheduler<TimerTask>, now: Timestamp) {
        if !self.config.enabled || self.pulse.is_some() {
            return;
        }
        let interval = Duration::from_secs(self.config.interval_secs);
        self.pulse = Some(scheduler.schedule_repeating(now, interval, TimerTask::SurgePulse));
        debug!(interval_secs = self.config.interval_secs, "surge pulse armed");
    }

    /// Cancel the pulse.
    pub fn stop(&mut self, scheduler: &mut Scheduler<TimerTask>) {
        if let Some(id) = self.pulse.take() {
            scheduler.cancel(id);
        }
    }

    /// Flip the enabled flag. The pulse follows the flag while a session
    /// is running. Returns the new state.
    pub fn toggle(
        &mut self,
        scheduler: &mut Scheduler<TimerTask>,
        now: Timestamp,
        session_running: bool,
    ) -> bool {
        self.config.enabled = !self.config.enabled;
        if !self.config.enabled {
            self.stop(scheduler);
        } else if session_running {
            self.start(scheduler, now);
        }
        info!(enabled = self.config.enabled, "surge toggled");
        self.config.enabled
    }

    pub fn set_threshold(&mut self, required: u32) {
        self.config.required_pops = required;
        info!(required, "surge threshold set");
    }

    /// Count one consumed resource. Returns the player's new total.
    pub fn record_pop(registry: &mut PlayerRegistry, player: PlayerId) -> u32 {
        let state = registry.entry(player);
        state.surge_pops += 1;
        state.surge_pops
    }

    /// Damage events for every alive, non-spectating player under the
    /// threshold.
    pub fn pulse<'a>(
        &self,
        registry: &PlayerRegistry,
        alive: impl IntoIterator<Item = &'a PlayerId>,
    ) -> Vec<Outbound> {
        let mut hits: Vec<Outbound> = alive
            .into_iter()
            .filter_map(|id| registry.get(*id))
            .filter(|state| !state.is_spectator && state.surge_pops < self.config.required_pops)
            .map(|state| Outbound::SurgeDamage {
                player: state.id,
                damage: self.config.damage,
                missing: self.config.required_pops - state.surge_pops,
            })
            .collect();
        hits.sort_by_key(|event| match event {
            Outbound::SurgeDamage { player, .. } => Some(*player),
            _ => None,
        });
        hits
    }
}
