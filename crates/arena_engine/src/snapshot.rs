//! Read-only stats view for readers off the authority task.
//!
//! The authority task republishes the view after each tick. Readers (the
//! NATS stats query handler, tests) clone a [`StatsSnapshot`] handle and
//! never see the engine itself.

use std::sync::Arc;

use arena_core::{MatchMode, PlayerId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::session::ReportedState;

/// Public numbers for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStats {
    pub id: PlayerId,
    pub kills: u32,
    pub points: u32,
    pub killstreak: u32,
    pub surge_pops: u32,
    pub total_wins: u32,
    pub total_kills: u32,
    pub total_deaths: u32,
    pub total_points: u64,
    pub best_kill_streak: u32,
    pub kd_ratio: f64,
    pub win_rate: f64,
    pub alive: bool,
    pub spectator: bool,
    pub in_combat: bool,
}

/// Session-level numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub state: ReportedState,
    pub mode: MatchMode,
    pub alive: usize,
    pub spectators: usize,
    pub grace_remaining_secs: u64,
    pub border_phase: u8,
    pub border_radius: f64,
}

impl Default for SessionSummary {
    fn default() -> Self {
        Self {
            state: ReportedState::Inactive,
            mode: MatchMode::default(),
            alive: 0,
            spectators: 0,
            grace_remaining_secs: 0,
            border_phase: 0,
            border_radius: 0.0,
        }
    }
}

/// Body of a stats request. No player means every player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsQuery {
    pub player: Option<PlayerId>,
}

/// Answer to a [`StatsQuery`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub session: SessionSummary,
    pub players: Vec<PlayerStats>,
}

/// Shared handle to the latest published view.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    players: Arc<DashMap<PlayerId, PlayerStats>>,
    session: Arc<watch::Sender<SessionSummary>>,
}

impl StatsSnapshot {
    #[must_use]
    pub fn new() -> Self {
        let (session, _) = watch::channel(SessionSummary::default());
        Self {
            players: Arc::new(DashMap::new()),
            session: Arc::new(session),
        }
    }

    /// Replace one player's entry.
    pub fn publish_player(&self, stats: PlayerStats) {
        self.players.insert(stats.id, stats);
    }

    /// Replace the session summary.
    pub fn publish_session(&self, summary: SessionSummary) {
        self.session.send_replace(summary);
    }

    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<PlayerStats> {
        self.players.get(&id).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn session(&self) -> SessionSummary {
        self.session.borrow().clone()
    }

    /// Receiver that wakes whenever the session summary changes.
    #[must_use]
    pub fn watch_session(&self) -> watch::Receiver<SessionSummary> {
        self.session.subscribe()
    }

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Answer a stats request. Players are ordered by id.
    #[must_use]
    pub fn query(&self, query: &StatsQuery) -> StatsReport {
        let mut players: Vec<PlayerStats> = match query.player {
            Some(id) => self.player(id).into_iter().collect(),
            None => self.players.iter().map(|entry| entry.value().clone()).collect(),
        };
        players.sort_by_key(|stats| stats.id);
        StatsReport {
            session: self.session(),
            players,
        }
    }
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(n: u128, kills: u32) -> PlayerStats {
        PlayerStats {
            id: PlayerId::from_u128(n),
            kills,
            points: 0,
            killstreak: 0,
            surge_pops: 0,
            total_wins: 0,
            total_kills: kills,
            total_deaths: 0,
            total_points: 0,
            best_kill_streak: 0,
            kd_ratio: f64::from(kills),
            win_rate: 0.0,
            alive: true,
            spectator: false,
            in_combat: false,
        }
    }

    #[test]
    fn test_published_players_visible_from_clones() {
        let snapshot = StatsSnapshot::new();
        let reader = snapshot.clone();
        snapshot.publish_player(stats(1, 2));
        snapshot.publish_player(stats(1, 3));
        assert_eq!(reader.player(PlayerId::from_u128(1)).unwrap().kills, 3);
        assert_eq!(reader.player_count(), 1);
    }

    #[test]
    fn test_session_summary_replaced() {
        let snapshot = StatsSnapshot::new();
        let mut rx = snapshot.watch_session();
        snapshot.publish_session(SessionSummary {
            state: ReportedState::Active,
            alive: 4,
            ..SessionSummary::default()
        });
        assert!(rx.has_changed().unwrap());
        assert_eq!(snapshot.session().alive, 4);
        assert_eq!(rx.borrow_and_update().state, ReportedState::Active);
    }

    #[test]
    fn test_query_filters_and_orders() {
        let snapshot = StatsSnapshot::new();
        snapshot.publish_player(stats(2, 1));
        snapshot.publish_player(stats(1, 5));

        let all = snapshot.query(&StatsQuery::default());
        assert_eq!(all.players.len(), 2);
        assert_eq!(all.players[0].id, PlayerId::from_u128(1));

        let one = snapshot.query(&StatsQuery {
            player: Some(PlayerId::from_u128(2)),
        });
        assert_eq!(one.players, vec![stats(2, 1)]);

        let missing = snapshot.query(&StatsQuery {
            player: Some(PlayerId::from_u128(9)),
        });
        assert!(missing.players.is_empty());
    }
}
