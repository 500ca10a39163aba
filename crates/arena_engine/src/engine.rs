//! Engine composition root.
//!
//! [`Engine`] owns every subsystem plus the timer scheduler and is driven
//! from exactly one task. Stimuli go in through [`Engine::handle`], time
//! advances through [`Engine::tick`], and events come out through
//! [`Engine::drain_outbound`]. Nothing here locks; the engine is moved into
//! the tick loop and other tasks only see its [`StatsSnapshot`].

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use arena_core::{
    AdminCommand, DamageCause, Inbound, MatchMode, Outbound, PartyCommand, PartyId, PlayerId,
    Timestamp,
};
use tracing::{debug, error, info, warn};

use crate::admin::AdminControls;
use crate::border::BorderSequencer;
use crate::combat::{Combatant, CombatTracker, DamageContext, DamageVerdict, LogoutOutcome};
use crate::config::EngineConfig;
use crate::error::{EngineError, StoreError};
use crate::kit::KitGate;
use crate::party::PartyRegistry;
use crate::registry::{LeaderboardMetric, PlayerRegistry};
use crate::scheduler::{Scheduler, TimerId};
use crate::session::{MatchSession, StartRequest};
use crate::snapshot::{PlayerStats, SessionSummary, StatsSnapshot};
use crate::store::PlayerStore;
use crate::surge::SurgeMonitor;
use crate::task::TimerTask;
use crate::win::{self, WinVerdict};

/// The authoritative match state.
pub struct Engine {
    config: EngineConfig,
    registry: PlayerRegistry,
    parties: PartyRegistry,
    admin: AdminControls,
    combat: CombatTracker,
    kits: KitGate,
    border: BorderSequencer,
    surge: SurgeMonitor,
    session: MatchSession,
    scheduler: Scheduler<TimerTask>,
    /// Connected, eligible players.
    online: BTreeSet<PlayerId>,
    /// Pending win evaluations, cancelled when the session stops.
    win_checks: Vec<TimerId>,
    win_sweep: Option<TimerId>,
    outbound: Vec<Outbound>,
    snapshot: StatsSnapshot,
    store: Box<dyn PlayerStore>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("session", &self.session)
            .field("online", &self.online.len())
            .field("timers", &self.scheduler.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine and load stored player records.
    ///
    /// A store that cannot be read is logged and the engine starts with an
    /// empty registry.
    #[must_use]
    pub fn new(config: EngineConfig, mut store: Box<dyn PlayerStore>) -> Self {
        let mut registry = PlayerRegistry::new();
        match store.load_all() {
            Ok(records) => {
                info!(records = records.len(), "player records loaded");
                registry.load_records(records);
            }
            Err(e) => error!(%e, "failed to load player records, starting empty"),
        }

        Self {
            parties: PartyRegistry::new(config.party.max_size),
            combat: CombatTracker::new(config.combat.clone()),
            kits: KitGate::new(config.kits.clone()),
            border: BorderSequencer::new(config.border.clone()),
            surge: SurgeMonitor::new(config.surge.clone()),
            registry,
            admin: AdminControls::new(),
            session: MatchSession::new(),
            scheduler: Scheduler::new(),
            online: BTreeSet::new(),
            win_checks: Vec::new(),
            win_sweep: None,
            outbound: Vec::new(),
            snapshot: StatsSnapshot::new(),
            store,
            config,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &MatchSession {
        &self.session
    }

    #[must_use]
    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    #[must_use]
    pub fn parties(&self) -> &PartyRegistry {
        &self.parties
    }

    #[must_use]
    pub fn admin(&self) -> &AdminControls {
        &self.admin
    }

    #[must_use]
    pub fn border(&self) -> &BorderSequencer {
        &self.border
    }

    #[must_use]
    pub fn surge(&self) -> &SurgeMonitor {
        &self.surge
    }

    #[must_use]
    pub fn kits(&self) -> &KitGate {
        &self.kits
    }

    #[must_use]
    pub fn online(&self) -> &BTreeSet<PlayerId> {
        &self.online
    }

    /// Handle to the read-only view shared with other tasks.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot.clone()
    }

    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    #[must_use]
    pub fn leaderboard(&self, metric: LeaderboardMetric, limit: usize) -> Vec<(PlayerId, f64)> {
        self.registry.top(metric, limit)
    }

    #[must_use]
    pub fn rank(&self, metric: LeaderboardMetric, player: PlayerId) -> Option<usize> {
        self.registry.rank(metric, player)
    }

    /// Take every event emitted since the last drain, in emission order.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    fn emit(&mut self, event: Outbound) {
        debug!(kind = event.kind(), "event queued");
        self.outbound.push(event);
    }

    // ── Stimuli ─────────────────────────────────────────────────────────

    /// Route one inbound stimulus.
    ///
    /// # Errors
    ///
    /// Returns the [`EngineError`] of the rejected operation; state is left
    /// unchanged in that case.
    pub fn handle(&mut self, now: Timestamp, inbound: Inbound) -> Result<(), EngineError> {
        match inbound {
            Inbound::PlayerJoined(player) => {
                self.player_joined(player);
                Ok(())
            }
            Inbound::PlayerLeft(player) => {
                self.player_left(now, player);
                Ok(())
            }
            Inbound::PlayerEliminated {
                victim,
                killer,
                assist,
            } => {
                self.eliminate(now, victim, killer, assist);
                Ok(())
            }
            Inbound::PlayerDamaged {
                target,
                source,
                cause,
            } => {
                let verdict = self.damage(now, target, source, cause);
                debug!(%target, ?verdict, "damage checked");
                Ok(())
            }
            Inbound::SurgePopped(player) => {
                let pops = SurgeMonitor::record_pop(&mut self.registry, player);
                debug!(%player, pops, "surge pop");
                Ok(())
            }
            Inbound::LoadoutSelected {
                player,
                slot,
                loadout,
            } => self.select_loadout(player, slot, &loadout),
            Inbound::LoadoutRequested { player, loadout } => {
                self.request_loadout(now, player, &loadout).map(|_| ())
            }
            Inbound::Admin(command) => self.admin_command(now, command),
            Inbound::Party(command) => self.party_command(command).map(|_| ()),
        }
    }

    /// A player connected. Ineligible players are turned away; joiners
    /// during a running session become spectators, as do all joiners when
    /// `session.join_as_spectator` is set. A repeated join is ignored.
    pub fn player_joined(&mut self, player: PlayerId) {
        if !self.admin.can_join(player) {
            info!(%player, "join denied");
            self.emit(Outbound::JoinDenied { player });
            return;
        }
        if !self.online.insert(player) {
            debug!(%player, "already online");
            return;
        }
        let state = self.registry.entry(player);
        state.frozen = self.admin.is_frozen(player);
        state.vanished = self.admin.is_vanished(player);
        info!(%player, online = self.online.len(), "player joined");

        if self.session.is_running() || self.config.session.join_as_spectator {
            self.session.admit_spectator(&mut self.registry, player);
            self.emit(Outbound::PlayerEnteredSpectator { player });
        }
    }

    /// A player disconnected.
    pub fn player_left(&mut self, now: Timestamp, player: PlayerId) {
        if !self.online.remove(&player) {
            return;
        }

        match self.combat.resolve_logout(&self.registry, player, now) {
            LogoutOutcome::Clean => {}
            LogoutOutcome::Flagged => {
                warn!(%player, "combat logout");
                self.emit(Outbound::CombatLogout {
                    player,
                    eliminated: false,
                });
            }
            LogoutOutcome::Eliminated { killer } => {
                let eliminated = self.eliminate(now, player, killer, None);
                warn!(%player, eliminated, "combat logout");
                self.emit(Outbound::CombatLogout { player, eliminated });
            }
        }

        let was_alive = self.session.remove_player(&mut self.registry, player);
        if was_alive && self.session.is_running() {
            let delay = self.config.session.quit_check_delay();
            self.schedule_win_check(now, delay);
        }

        if let Err(e) = self.parties.leave(player) {
            debug!(%player, %e, "no party to leave");
        }
        self.combat.forget(player);

        if let Some(state) = self.registry.get(player) {
            let record = state.to_record();
            if let Err(e) = self.store.save(&[record]) {
                error!(%player, %e, "failed to save player record");
            }
        }
        info!(%player, online = self.online.len(), "player left");
    }

    /// Record an elimination. Ignored unless a session is running (ACTIVE
    /// or PAUSED) and the victim is alive. Returns `true` if it was
    /// recorded.
    pub fn eliminate(
        &mut self,
        now: Timestamp,
        victim: PlayerId,
        killer: Option<PlayerId>,
        assist: Option<PlayerId>,
    ) -> bool {
        if !self.session.is_running() {
            debug!(%victim, "elimination outside session ignored");
            return false;
        }
        if !self.session.is_alive(victim) {
            debug!(%victim, "elimination of non-alive player ignored");
            return false;
        }

        let killer = killer.filter(|k| *k != victim);
        let outcome = self.registry.record_elimination(victim, killer);
        self.session.eliminate_to_spectator(&mut self.registry, victim);
        self.combat.forget(victim);

        info!(
            %victim,
            killer = ?killer,
            points = outcome.points_transferred,
            "player eliminated"
        );
        self.emit(Outbound::EliminationRecorded {
            victim,
            killer,
            assist,
            points_transferred: outcome.points_transferred,
        });
        self.emit(Outbound::PlayerEnteredSpectator { player: victim });

        if let (Some(killer), Some(streak)) = (killer, outcome.killer_streak) {
            if self.config.killstreak.milestones.contains(&streak) {
                self.emit(Outbound::KillstreakMilestoneReached {
                    player: killer,
                    streak,
                });
            }
            if outcome.first_blood && self.config.killstreak.announce_first_blood {
                self.emit(Outbound::FirstBlood { player: killer });
            }
        }

        if self.kits.should_reissue(outcome.victim_event_deaths)
            && self
                .registry
                .get(victim)
                .is_some_and(|state| !state.loadouts[0].is_empty())
        {
            self.scheduler.schedule_after(
                now,
                self.kits.reissue_delay(),
                TimerTask::ReissueLoadout(victim),
            );
        }

        let delay = self.config.session.win_check_delay();
        self.schedule_win_check(now, delay);
        true
    }

    /// Check a damaging interaction and tag both players when it goes
    /// through.
    pub fn damage(
        &mut self,
        now: Timestamp,
        target: PlayerId,
        source: Option<PlayerId>,
        cause: DamageCause,
    ) -> DamageVerdict {
        let source = source.filter(|s| *s != target);
        let ctx = DamageContext {
            session_running: self.session.is_running(),
            grace_active: self.session.is_grace_active(now),
            same_party: source.is_some_and(|s| self.parties.same_party(target, s)),
            friendly_fire: self.config.party.friendly_fire,
        };
        let target_side = self.combatant(target);

        let Some(source) = source else {
            return self.combat.check_environment(target_side, cause, ctx);
        };

        let verdict = self
            .combat
            .check_attack(target_side, self.combatant(source), ctx);
        if verdict.is_allowed() {
            let expires_at = self.combat.tag(&mut self.registry, target, source, now);
            self.emit(Outbound::CombatTagApplied {
                player: target,
                expires_at,
            });
            self.emit(Outbound::CombatTagApplied {
                player: source,
                expires_at,
            });
        }
        verdict
    }

    fn combatant(&self, player: PlayerId) -> Combatant {
        Combatant {
            spectator: self.session.is_spectator(player),
            frozen: self.admin.is_frozen(player),
        }
    }

    /// Store a loadout in one of the player's slots.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingResource`] for a bad slot or unknown loadout.
    pub fn select_loadout(
        &mut self,
        player: PlayerId,
        slot: usize,
        loadout: &str,
    ) -> Result<(), EngineError> {
        self.kits.select(&mut self.registry, player, slot, loadout)
    }

    /// Grant a loadout through the cooldown gate.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingResource`] for an offline player or unknown
    /// loadout, [`EngineError::CooldownActive`] while gated.
    pub fn request_loadout(
        &mut self,
        now: Timestamp,
        player: PlayerId,
        loadout: &str,
    ) -> Result<String, EngineError> {
        if !self.online.contains(&player) {
            return Err(EngineError::MissingResource(format!("online player {player}")));
        }
        let name = self
            .kits
            .grant(&mut self.registry, player, loadout, now, false)?;
        self.emit(Outbound::LoadoutGranted {
            player,
            loadout: name.clone(),
            forced: false,
        });
        Ok(name)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Start a session with every online player alive.
    ///
    /// # Errors
    ///
    /// See [`MatchSession::start`].
    pub fn start(
        &mut self,
        now: Timestamp,
        force: bool,
        mode: MatchMode,
        grace_secs: Option<u64>,
    ) -> Result<(), EngineError> {
        let grace_secs = grace_secs.unwrap_or(self.config.session.grace_period_secs);
        let request = StartRequest {
            force,
            mode,
            grace: Duration::from_secs(grace_secs),
            min_players: self.config.session.min_players,
        };
        self.session.start(
            request,
            &self.online,
            &mut self.registry,
            &mut self.scheduler,
            now,
        )?;

        self.surge.start(&mut self.scheduler, now);
        let sweep = self.config.session.win_sweep_interval_secs;
        if sweep > 0 {
            self.win_sweep = Some(self.scheduler.schedule_repeating(
                now,
                Duration::from_secs(sweep),
                TimerTask::WinSweep,
            ));
        }

        let players = self.session.alive().len();
        self.emit(Outbound::SessionStarted { mode, players });
        Ok(())
    }

    /// Stop the session. Returns `false` if none was running.
    pub fn stop(&mut self) -> bool {
        if !self.session.stop(&mut self.registry, &mut self.scheduler) {
            return false;
        }
        self.border.halt(&mut self.scheduler);
        self.surge.stop(&mut self.scheduler);
        for id in self.win_checks.drain(..) {
            self.scheduler.cancel(id);
        }
        if let Some(id) = self.win_sweep.take() {
            self.scheduler.cancel(id);
        }
        self.emit(Outbound::SessionStopped);
        true
    }

    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] unless ACTIVE.
    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.session.pause()?;
        self.border.pause(&mut self.scheduler);
        self.emit(Outbound::SessionPaused);
        Ok(())
    }

    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] unless PAUSED.
    pub fn resume(&mut self, now: Timestamp) -> Result<(), EngineError> {
        self.session.resume()?;
        self.emit(Outbound::SessionResumed);
        if let Some(event) = self.border.resume(&mut self.scheduler, now) {
            self.emit(event);
        }
        // Checks that fired while paused were skipped.
        self.schedule_win_check(now, Duration::ZERO);
        Ok(())
    }

    fn schedule_win_check(&mut self, now: Timestamp, delay: Duration) {
        self.win_checks.retain(|id| self.scheduler.is_pending(*id));
        let id = self
            .scheduler
            .schedule_after(now, delay, TimerTask::EvaluateWin);
        self.win_checks.push(id);
    }

    fn evaluate_win(&mut self) {
        if !self.session.is_active() {
            debug!(state = self.session.state().as_str(), "win check skipped");
            return;
        }
        let verdict = win::evaluate(self.session.mode(), self.session.alive(), &self.parties);
        match verdict {
            WinVerdict::Undecided => {}
            WinVerdict::NoWinner => {
                info!("session ended without a winner");
                self.emit(Outbound::MatchEndedWithoutWinner);
                self.stop();
            }
            WinVerdict::Winner(ref winner) => {
                for player in verdict.credited() {
                    self.registry.add_win(player);
                }
                info!(?winner, "winner declared");
                self.emit(Outbound::WinnerDeclared(winner.clone()));
                self.stop();
            }
        }
    }

    // ── Commands ────────────────────────────────────────────────────────

    /// Apply an administrative override.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying operation.
    pub fn admin_command(&mut self, now: Timestamp, command: AdminCommand) -> Result<(), EngineError> {
        match command {
            AdminCommand::Start {
                force,
                mode,
                grace_secs,
            } => self.start(now, force, mode, grace_secs),
            AdminCommand::Stop => {
                self.stop();
                Ok(())
            }
            AdminCommand::Pause => self.pause(),
            AdminCommand::Resume => self.resume(now),
            AdminCommand::SetPhase { phase, seconds } => {
                let event = self.border.jump(&mut self.scheduler, phase, seconds, now)?;
                self.emit(event);
                Ok(())
            }
            AdminCommand::StartBorder => {
                if !self.session.is_active() {
                    return Err(EngineError::InvalidTransition {
                        action: "start border",
                        state: self.session.state().as_str(),
                    });
                }
                if let Some(event) = self.border.start(&mut self.scheduler, now) {
                    self.emit(event);
                }
                Ok(())
            }
            AdminCommand::ResetBorder => {
                self.border.reset(&mut self.scheduler);
                Ok(())
            }
            AdminCommand::SetSurgeThreshold(required) => {
                self.surge.set_threshold(required);
                Ok(())
            }
            AdminCommand::ToggleSurge => {
                let running = self.session.is_running();
                self.surge.toggle(&mut self.scheduler, now, running);
                Ok(())
            }
            AdminCommand::Freeze(player, on) => {
                self.admin.freeze(player, on);
                self.registry.entry(player).frozen = on;
                Ok(())
            }
            AdminCommand::Vanish(player, on) => {
                self.admin.vanish(player, on);
                self.registry.entry(player).vanished = on;
                Ok(())
            }
            AdminCommand::Ban(player, on) => {
                self.admin.ban(player, on);
                self.registry.entry(player).banned_from_event = on;
                Ok(())
            }
            AdminCommand::SetWhitelist(enabled) => {
                self.admin.set_whitelist(enabled);
                Ok(())
            }
            AdminCommand::Whitelist(player, on) => {
                self.admin.whitelist(player, on);
                Ok(())
            }
            AdminCommand::ResetCooldown(player) => {
                KitGate::reset(&mut self.registry, player);
                Ok(())
            }
            AdminCommand::Revive(player) => self.session.revive(&mut self.registry, player),
            AdminCommand::AddLoadout(name) => {
                if self.kits.add_loadout(&name) {
                    info!(loadout = %name, "loadout added to catalog");
                }
                Ok(())
            }
            AdminCommand::DisbandAllParties => {
                self.parties.disband_all();
                Ok(())
            }
            AdminCommand::SetTitle(player, title) => {
                self.registry.entry(player).selected_title = title;
                Ok(())
            }
        }
    }

    /// Apply a party command on behalf of `actor`. Returns the affected
    /// party where there is one.
    ///
    /// # Errors
    ///
    /// Propagates the party rule that rejected the command.
    pub fn party_command(&mut self, command: PartyCommand) -> Result<Option<PartyId>, EngineError> {
        match command {
            PartyCommand::Create { actor } => self.parties.create(actor).map(Some),
            PartyCommand::Invite { actor, target } => {
                let party = self.led_party(actor)?;
                if !self.online.contains(&target) {
                    return Err(EngineError::MissingResource(format!("online player {target}")));
                }
                self.parties.invite(party, target)?;
                Ok(Some(party))
            }
            PartyCommand::Accept { actor, party } => {
                self.parties.accept(actor, party)?;
                Ok(Some(party))
            }
            PartyCommand::Kick { actor, target } => {
                let party = self.led_party(actor)?;
                self.parties.kick(actor, target)?;
                Ok(Some(party))
            }
            PartyCommand::Leave { actor } => {
                self.parties.leave(actor)?;
                Ok(None)
            }
            PartyCommand::Disband { actor } => {
                let party = self.led_party(actor)?;
                self.parties.disband(party);
                Ok(Some(party))
            }
        }
    }

    fn led_party(&self, actor: PlayerId) -> Result<PartyId, EngineError> {
        let group = self
            .parties
            .party_of(actor)
            .ok_or(EngineError::NotInParty(actor))?;
        if !group.is_leader(actor) {
            return Err(EngineError::NotLeader(actor));
        }
        Ok(group.id)
    }

    // ── Time ────────────────────────────────────────────────────────────

    /// Run every timer due at `now`, then republish the snapshot.
    ///
    /// Each callback runs in isolation: an error or panic is logged and the
    /// remaining timers still run.
    pub fn tick(&mut self, now: Timestamp) {
        while let Some((id, task)) = self.scheduler.pop_due(now) {
            self.run_timer(now, id, task);
        }
        self.publish_snapshot(now);
    }

    fn run_timer(&mut self, now: Timestamp, id: TimerId, task: TimerTask) {
        let label = format!("{task:?}");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(now, task)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(timer = %id, task = %label, %e, "timer callback failed"),
            Err(_) => error!(timer = %id, task = %label, "timer callback panicked"),
        }
    }

    fn dispatch(&mut self, now: Timestamp, task: TimerTask) -> Result<(), EngineError> {
        match task {
            TimerTask::GraceExpired => {
                if self.session.end_grace() {
                    self.emit(Outbound::GracePeriodEnded);
                }
            }
            TimerTask::BorderAdvance => {
                if let Some(event) = self.border.advance(&mut self.scheduler, now) {
                    self.emit(event);
                }
            }
            TimerTask::EvaluateWin | TimerTask::WinSweep => self.evaluate_win(),
            TimerTask::SurgePulse => {
                if self.session.is_active() {
                    let hits = self.surge.pulse(&self.registry, self.session.alive());
                    for hit in hits {
                        self.emit(hit);
                    }
                }
            }
            TimerTask::ReissueLoadout(player) => {
                if !self.session.is_running() || !self.online.contains(&player) {
                    return Ok(());
                }
                let slot = self
                    .registry
                    .get(player)
                    .map(|state| state.loadouts[0].clone())
                    .unwrap_or_default();
                if slot.is_empty() {
                    return Ok(());
                }
                let name = self
                    .kits
                    .grant(&mut self.registry, player, &slot, now, true)?;
                self.emit(Outbound::LoadoutGranted {
                    player,
                    loadout: name,
                    forced: true,
                });
            }
            #[cfg(test)]
            TimerTask::Explode => panic!("timer exploded"),
        }
        Ok(())
    }

    fn publish_snapshot(&mut self, now: Timestamp) {
        for state in self.registry.iter() {
            self.snapshot.publish_player(PlayerStats {
                id: state.id,
                kills: state.kills,
                points: state.points,
                killstreak: state.killstreak,
                surge_pops: state.surge_pops,
                total_wins: state.total_wins,
                total_kills: state.total_kills,
                total_deaths: state.total_deaths,
                total_points: state.total_points,
                best_kill_streak: state.best_kill_streak,
                kd_ratio: state.kd_ratio(),
                win_rate: state.win_rate(),
                alive: state.is_alive,
                spectator: state.is_spectator,
                in_combat: now < state.combat_tag_expiry,
            });
        }
        let grace_remaining_secs = self.session.grace_remaining(now).as_secs();
        self.snapshot.publish_session(SessionSummary {
            state: self.session.reported_state(now),
            mode: self.session.mode(),
            alive: self.session.alive().len(),
            spectators: self.session.spectators().len(),
            grace_remaining_secs,
            border_phase: self.border.current_phase(),
            border_radius: self.border.radius_at(now),
        });
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Save every known player record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store rejects the batch.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let records = self.registry.records();
        self.store.save(&records)?;
        info!(records = records.len(), "player records flushed");
        Ok(())
    }
}
