//! Session state machine.
//!
//! ```text
//! INACTIVE ──start──▶ ACTIVE ──pause──▶ PAUSED
//!    ▲                 │  ▲               │
//!    └──────stop───────┘  └────resume─────┘
//! ```
//!
//! The grace period is an overlay on ACTIVE rather than a state of its own.
//! The session owns both rosters and keeps each player's `is_alive` and
//! `is_spectator` flags in step with roster membership.

use std::collections::BTreeSet;
use std::time::Duration;

use arena_core::{MatchMode, PlayerId, Timestamp};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::registry::PlayerRegistry;
use crate::scheduler::{Scheduler, TimerId};
use crate::task::TimerTask;

/// Lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SessionState {
    #[default]
    Inactive,
    Active,
    Paused,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }
}

/// State as reported to observers, with the grace overlay folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportedState {
    Inactive,
    Active,
    Paused,
    GracePeriod,
}

/// Parameters of a start request.
#[derive(Debug, Clone, Copy)]
pub struct StartRequest {
    pub force: bool,
    pub mode: MatchMode,
    pub grace: Duration,
    pub min_players: usize,
}

#[derive(Debug, Default)]
pub struct MatchSession {
    state: SessionState,
    mode: MatchMode,
    alive: BTreeSet<PlayerId>,
    spectators: BTreeSet<PlayerId>,
    grace_ends_at: Option<Timestamp>,
    grace_timer: Option<TimerId>,
}

impl MatchSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Active or paused.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state != SessionState::Inactive
    }

    #[must_use]
    pub fn alive(&self) -> &BTreeSet<PlayerId> {
        &self.alive
    }

    #[must_use]
    pub fn spectators(&self) -> &BTreeSet<PlayerId> {
        &self.spectators
    }

    #[must_use]
    pub fn is_alive(&self, player: PlayerId) -> bool {
        self.alive.contains(&player)
    }

    #[must_use]
    pub fn is_spectator(&self, player: PlayerId) -> bool {
        self.spectators.contains(&player)
    }

    /// Start a session with every player in `online` alive.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] when a session is already running,
    /// [`EngineError::NotEnoughPlayers`] when short of the minimum without
    /// `force`. Nothing is changed on error.
    pub fn start(
        &mut self,
        request: StartRequest,
        online: &BTreeSet<PlayerId>,
        registry: &mut PlayerRegistry,
        scheduler: &mut Scheduler<TimerTask>,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        if self.is_running() {
            return Err(EngineError::InvalidTransition {
                action: "start",
                state: self.state.as_str(),
            });
        }
        if !request.force && online.len() < request.min_players {
            return Err(EngineError::NotEnoughPlayers {
                online: online.len(),
                required: request.min_players,
            });
        }

        registry.reset_sessions();
        self.alive.clear();
        self.spectators.clear();
        for &player in online {
            self.alive.insert(player);
            registry.entry(player).is_alive = true;
        }

        self.state = SessionState::Active;
        self.mode = request.mode;
        self.cancel_grace(scheduler);
        if !request.grace.is_zero() {
            let ends = now.after(request.grace);
            self.grace_ends_at = Some(ends);
            self.grace_timer = Some(scheduler.schedule_at(ends, TimerTask::GraceExpired));
        }

        info!(
            mode = request.mode.as_str(),
            players = self.alive.len(),
            grace_secs = request.grace.as_secs(),
            "session started"
        );
        Ok(())
    }

    /// Stop the session. Returns `false` if it was not running.
    pub fn stop(&mut self, registry: &mut PlayerRegistry, scheduler: &mut Scheduler<TimerTask>) -> bool {
        if !self.is_running() {
            return false;
        }
        for player in self.alive.iter().chain(self.spectators.iter()) {
            let state = registry.entry(*player);
            state.is_alive = false;
            state.is_spectator = false;
        }
        self.alive.clear();
        self.spectators.clear();
        self.cancel_grace(scheduler);
        self.state = SessionState::Inactive;
        info!("session stopped");
        true
    }

    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] unless ACTIVE.
    pub fn pause(&mut self) -> Result<(), EngineError> {
        if self.state != SessionState::Active {
            return Err(EngineError::InvalidTransition {
                action: "pause",
                state: self.state.as_str(),
            });
        }
        self.state = SessionState::Paused;
        info!("session paused");
        Ok(())
    }

    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] unless PAUSED.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        if self.state != SessionState::Paused {
            return Err(EngineError::InvalidTransition {
                action: "resume",
                state: self.state.as_str(),
            });
        }
        self.state = SessionState::Active;
        info!("session resumed");
        Ok(())
    }

    fn cancel_grace(&mut self, scheduler: &mut Scheduler<TimerTask>) {
        self.grace_ends_at = None;
        if let Some(id) = self.grace_timer.take() {
            scheduler.cancel(id);
        }
    }

    /// Grace time left; clears the overlay once it has elapsed.
    pub fn grace_remaining(&mut self, now: Timestamp) -> Duration {
        let Some(ends) = self.grace_ends_at else {
            return Duration::ZERO;
        };
        let remaining = now.until(ends);
        if remaining.is_zero() {
            self.grace_ends_at = None;
        }
        remaining
    }

    /// Whether damage is currently suppressed by the grace overlay.
    #[must_use]
    pub fn is_grace_active(&self, now: Timestamp) -> bool {
        self.is_running() && self.grace_ends_at.is_some_and(|ends| now < ends)
    }

    /// Handle the grace timer. Returns `true` the one time the overlay ends
    /// through it.
    pub fn end_grace(&mut self) -> bool {
        self.grace_timer = None;
        if !self.is_running() {
            return false;
        }
        self.grace_ends_at = None;
        info!("grace period ended");
        true
    }

    #[must_use]
    pub fn reported_state(&self, now: Timestamp) -> ReportedState {
        match self.state {
            SessionState::Inactive => ReportedState::Inactive,
            SessionState::Paused => ReportedState::Paused,
            SessionState::Active if self.is_grace_active(now) => ReportedState::GracePeriod,
            SessionState::Active => ReportedState::Active,
        }
    }

    /// Move an alive player to the spectator roster. Returns `false` if
    /// they were not alive.
    pub fn eliminate_to_spectator(&mut self, registry: &mut PlayerRegistry, player: PlayerId) -> bool {
        if !self.alive.remove(&player) {
            return false;
        }
        self.spectators.insert(player);
        let state = registry.entry(player);
        state.is_alive = false;
        state.is_spectator = true;
        debug!(%player, "moved to spectators");
        true
    }

    /// Admit a mid-session joiner as a spectator.
    pub fn admit_spectator(&mut self, registry: &mut PlayerRegistry, player: PlayerId) {
        self.alive.remove(&player);
        self.spectators.insert(player);
        let state = registry.entry(player);
        state.is_alive = false;
        state.is_spectator = true;
    }

    /// Bring a spectator back into play.
    ///
    /// # Errors
    ///
    /// Fails when no session is running or the player is not spectating.
    pub fn revive(&mut self, registry: &mut PlayerRegistry, player: PlayerId) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::InvalidTransition {
                action: "revive",
                state: self.state.as_str(),
            });
        }
        if !self.spectators.remove(&player) {
            return Err(EngineError::MissingResource(format!("spectator {player}")));
        }
        self.alive.insert(player);
        let state = registry.entry(player);
        state.is_alive = true;
        state.is_spectator = false;
        info!(%player, "player revived");
        Ok(())
    }

    /// Drop a disconnecting player from both rosters. Returns `true` if
    /// they were alive.
    pub fn remove_player(&mut self, registry: &mut PlayerRegistry, player: PlayerId) -> bool {
        let was_alive = self.alive.remove(&player);
        self.spectators.remove(&player);
        if registry.contains(player) {
            let state = registry.entry(player);
            state.is_alive = false;
            state.is_spectator = false;
        }
        was_alive
    }
}
