//! Player runtime registry.
//!
//! Every player the engine has ever seen has exactly one
//! [`PlayerRuntimeState`] for the lifetime of the process. Records are
//! created on first access by identity with every counter at zero, every
//! flag cleared and every clock at the epoch; they are never removed.
//! Session-scoped fields are reset when a new session starts, persistent
//! fields survive across sessions and are exchanged with the store as
//! [`PersistedRecord`]s.

use std::cmp::Ordering;
use std::collections::HashMap;

use arena_core::{LOADOUT_SLOTS, PersistedRecord, PlayerId, Timestamp};

/// Runtime state of a single player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRuntimeState {
    pub id: PlayerId,

    // Session-scoped.
    pub kills: u32,
    pub points: u32,
    pub killstreak: u32,
    pub surge_pops: u32,
    pub is_alive: bool,
    pub is_spectator: bool,
    /// Deaths in the current session; drives loadout auto-reissue.
    pub event_deaths: u32,

    // Persistent.
    pub total_wins: u32,
    pub total_kills: u32,
    pub total_deaths: u32,
    pub total_points: u64,
    pub best_kill_streak: u32,
    pub selected_title: Option<String>,

    // Resource clocks.
    pub combat_tag_expiry: Timestamp,
    pub kit_cooldown_expiry: Timestamp,

    /// Loadout names per slot; empty string is an empty slot.
    pub loadouts: [String; LOADOUT_SLOTS],

    // Admin flags.
    pub frozen: bool,
    pub vanished: bool,
    pub banned_from_event: bool,
}

impl PlayerRuntimeState {
    /// A zero-valued record for `id`.
    #[must_use]
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            kills: 0,
            points: 0,
            killstreak: 0,
            surge_pops: 0,
            is_alive: false,
            is_spectator: false,
            event_deaths: 0,
            total_wins: 0,
            total_kills: 0,
            total_deaths: 0,
            total_points: 0,
            best_kill_streak: 0,
            selected_title: None,
            combat_tag_expiry: Timestamp::ZERO,
            kit_cooldown_expiry: Timestamp::ZERO,
            loadouts: Default::default(),
            frozen: false,
            vanished: false,
            banned_from_event: false,
        }
    }

    /// Kills per death; equals total kills while the player never died.
    #[must_use]
    pub fn kd_ratio(&self) -> f64 {
        if self.total_deaths == 0 {
            f64::from(self.total_kills)
        } else {
            f64::from(self.total_kills) / f64::from(self.total_deaths)
        }
    }

    /// Wins as a percentage of wins plus deaths; zero with no games.
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        let games = self.total_wins + self.total_deaths;
        if games == 0 {
            0.0
        } else {
            f64::from(self.total_wins) / f64::from(games) * 100.0
        }
    }

    /// Clear every session-scoped field.
    pub fn reset_session(&mut self) {
        self.kills = 0;
        self.points = 0;
        self.killstreak = 0;
        self.surge_pops = 0;
        self.is_alive = false;
        self.is_spectator = false;
        self.event_deaths = 0;
    }

    /// The persistent slice of this record.
    #[must_use]
    pub fn to_record(&self) -> PersistedRecord {
        PersistedRecord {
            id: self.id,
            total_wins: self.total_wins,
            total_kills: self.total_kills,
            total_deaths: self.total_deaths,
            total_points: self.total_points,
            best_kill_streak: self.best_kill_streak,
            selected_loadouts: self.loadouts.clone(),
            selected_title: self.selected_title.clone(),
        }
    }

    /// Overwrite the persistent fields from a stored record.
    pub fn apply_record(&mut self, record: PersistedRecord) {
        self.total_wins = record.total_wins;
        self.total_kills = record.total_kills;
        self.total_deaths = record.total_deaths;
        self.total_points = record.total_points;
        self.best_kill_streak = record.best_kill_streak;
        self.loadouts = record.selected_loadouts;
        self.selected_title = record.selected_title;
    }
}

/// What an elimination changed, for event emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EliminationOutcome {
    /// Points moved to the killer (victim points + 1), or 0 without one.
    pub points_transferred: u32,
    /// The killer's streak after the kill.
    pub killer_streak: Option<u32>,
    /// This was the killer's first kill ever.
    pub first_blood: bool,
    /// The victim's session death count after the elimination.
    pub victim_event_deaths: u32,
}

/// Statistic a leaderboard is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardMetric {
    Wins,
    Kills,
    KdRatio,
    Points,
}

impl LeaderboardMetric {
    fn value(self, state: &PlayerRuntimeState) -> f64 {
        match self {
            Self::Wins => f64::from(state.total_wins),
            Self::Kills => f64::from(state.total_kills),
            Self::KdRatio => state.kd_ratio(),
            Self::Points => state.total_points as f64,
        }
    }
}

/// Keyed store of every player record.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<PlayerId, PlayerRuntimeState>,
}

impl PlayerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
        }
    }

    /// Returns the record for `id`, creating a zero-valued one on first
    /// access.
    pub fn entry(&mut self, id: PlayerId) -> &mut PlayerRuntimeState {
        self.players
            .entry(id)
            .or_insert_with(|| PlayerRuntimeState::new(id))
    }

    /// Returns the record for `id` without creating it.
    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<&PlayerRuntimeState> {
        self.players.get(&id)
    }

    /// Returns `true` if a record exists for `id`.
    #[must_use]
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Returns an iterator over all records.
    pub fn iter(&self) -> impl Iterator<Item = &PlayerRuntimeState> {
        self.players.values()
    }

    /// Returns the number of known players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if no player has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Reset the session-scoped fields of every known player.
    pub fn reset_sessions(&mut self) {
        for state in self.players.values_mut() {
            state.reset_session();
        }
    }

    /// Merge stored records into the registry.
    pub fn load_records(&mut self, records: impl IntoIterator<Item = PersistedRecord>) {
        for record in records {
            self.entry(record.id).apply_record(record);
        }
    }

    /// The persistent slice of every known player.
    #[must_use]
    pub fn records(&self) -> Vec<PersistedRecord> {
        self.players
            .values()
            .map(PlayerRuntimeState::to_record)
            .collect()
    }

    /// Credit one win.
    pub fn add_win(&mut self, id: PlayerId) {
        self.entry(id).total_wins += 1;
    }

    /// Apply the bookkeeping of an elimination.
    ///
    /// The victim's points plus one move to the killer; the victim's points
    /// and streak drop to zero. A killer equal to the victim is ignored.
    pub fn record_elimination(
        &mut self,
        victim: PlayerId,
        killer: Option<PlayerId>,
    ) -> EliminationOutcome {
        let killer = killer.filter(|k| *k != victim);

        let victim_state = self.entry(victim);
        let stolen = victim_state.points;
        victim_state.points = 0;
        victim_state.killstreak = 0;
        victim_state.total_deaths += 1;
        victim_state.event_deaths += 1;
        let victim_event_deaths = victim_state.event_deaths;

        let Some(killer) = killer else {
            return EliminationOutcome {
                points_transferred: 0,
                killer_streak: None,
                first_blood: false,
                victim_event_deaths,
            };
        };

        let transfer = stolen + 1;
        let killer_state = self.entry(killer);
        killer_state.kills += 1;
        killer_state.total_kills += 1;
        killer_state.points += transfer;
        killer_state.total_points += u64::from(transfer);
        killer_state.killstreak += 1;
        killer_state.best_kill_streak = killer_state.best_kill_streak.max(killer_state.killstreak);

        EliminationOutcome {
            points_transferred: transfer,
            killer_streak: Some(killer_state.killstreak),
            first_blood: killer_state.total_kills == 1,
            victim_event_deaths,
        }
    }

    /// The top `limit` players by `metric`, highest first.
    #[must_use]
    pub fn top(&self, metric: LeaderboardMetric, limit: usize) -> Vec<(PlayerId, f64)> {
        let mut ranked = self.ranked(metric);
        ranked.truncate(limit);
        ranked
    }

    /// 1-based rank of `id` by `metric`, or `None` for unknown players.
    #[must_use]
    pub fn rank(&self, metric: LeaderboardMetric, id: PlayerId) -> Option<usize> {
        self.ranked(metric)
            .iter()
            .position(|(player, _)| *player == id)
            .map(|idx| idx + 1)
    }

    fn ranked(&self, metric: LeaderboardMetric) -> Vec<(PlayerId, f64)> {
        let mut ranked: Vec<(PlayerId, f64)> = self
            .players
            .values()
            .map(|state| (state.id, metric.value(state)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u128) -> PlayerId {
        PlayerId::from_u128(n)
    }

    #[test]
    fn test_first_access_creates_zero_record() {
        let mut registry = PlayerRegistry::new();
        assert!(registry.get(pid(1)).is_none());

        let state = registry.entry(pid(1));
        assert_eq!(*state, PlayerRuntimeState::new(pid(1)));
        assert_eq!(state.kills, 0);
        assert_eq!(state.total_wins, 0);
        assert!(!state.is_alive);
        assert_eq!(state.combat_tag_expiry, Timestamp::ZERO);
        assert!(state.loadouts.iter().all(String::is_empty));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_entry_returns_same_record() {
        let mut registry = PlayerRegistry::new();
        registry.entry(pid(1)).kills = 4;
        assert_eq!(registry.entry(pid(1)).kills, 4);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_elimination_transfers_points() {
        let mut registry = PlayerRegistry::new();
        registry.entry(pid(1)).points = 6;
        registry.entry(pid(1)).killstreak = 3;
        registry.entry(pid(2)).points = 2;
        registry.entry(pid(2)).killstreak = 1;
        registry.entry(pid(2)).best_kill_streak = 5;

        let outcome = registry.record_elimination(pid(1), Some(pid(2)));

        assert_eq!(outcome.points_transferred, 7);
        let victim = registry.get(pid(1)).unwrap();
        assert_eq!(victim.points, 0);
        assert_eq!(victim.killstreak, 0);
        assert_eq!(victim.total_deaths, 1);
        assert_eq!(victim.event_deaths, 1);

        let killer = registry.get(pid(2)).unwrap();
        assert_eq!(killer.points, 2 + 6 + 1);
        assert_eq!(killer.killstreak, 2);
        assert_eq!(killer.best_kill_streak, 5);
        assert_eq!(killer.kills, 1);
        assert_eq!(killer.total_kills, 1);
        assert_eq!(outcome.killer_streak, Some(2));
    }

    #[test]
    fn test_best_streak_tracks_new_maximum() {
        let mut registry = PlayerRegistry::new();
        for victim in 10..13 {
            registry.record_elimination(pid(victim), Some(pid(1)));
        }
        let killer = registry.get(pid(1)).unwrap();
        assert_eq!(killer.killstreak, 3);
        assert_eq!(killer.best_kill_streak, 3);
    }

    #[test]
    fn test_elimination_without_killer_loses_points() {
        let mut registry = PlayerRegistry::new();
        registry.entry(pid(1)).points = 4;
        let outcome = registry.record_elimination(pid(1), None);
        assert_eq!(outcome.points_transferred, 0);
        assert_eq!(outcome.killer_streak, None);
        assert_eq!(registry.get(pid(1)).unwrap().points, 0);
    }

    #[test]
    fn test_self_elimination_counts_as_no_killer() {
        let mut registry = PlayerRegistry::new();
        let outcome = registry.record_elimination(pid(1), Some(pid(1)));
        assert_eq!(outcome.killer_streak, None);
        assert_eq!(registry.get(pid(1)).unwrap().kills, 0);
    }

    #[test]
    fn test_first_blood_only_on_first_lifetime_kill() {
        let mut registry = PlayerRegistry::new();
        assert!(registry.record_elimination(pid(2), Some(pid(1))).first_blood);
        assert!(!registry.record_elimination(pid(3), Some(pid(1))).first_blood);
    }

    #[test]
    fn test_reset_sessions_keeps_persistent_fields() {
        let mut registry = PlayerRegistry::new();
        registry.record_elimination(pid(2), Some(pid(1)));
        registry.add_win(pid(1));
        registry.reset_sessions();

        let state = registry.get(pid(1)).unwrap();
        assert_eq!(state.kills, 0);
        assert_eq!(state.points, 0);
        assert_eq!(state.killstreak, 0);
        assert_eq!(state.total_kills, 1);
        assert_eq!(state.total_wins, 1);
        assert_eq!(registry.get(pid(2)).unwrap().event_deaths, 0);
    }

    #[test]
    fn test_record_roundtrip_through_registry() {
        let mut registry = PlayerRegistry::new();
        let mut record = PersistedRecord::empty(pid(9));
        record.total_wins = 4;
        record.selected_loadouts[0] = "archer".to_string();
        registry.load_records([record.clone()]);
        assert_eq!(registry.records(), vec![record]);
    }

    #[test]
    fn test_kd_and_win_rate() {
        let mut state = PlayerRuntimeState::new(pid(1));
        assert!((state.kd_ratio() - 0.0).abs() < f64::EPSILON);
        assert!((state.win_rate() - 0.0).abs() < f64::EPSILON);
        state.total_kills = 6;
        assert!((state.kd_ratio() - 6.0).abs() < f64::EPSILON);
        state.total_deaths = 3;
        state.total_wins = 1;
        assert!((state.kd_ratio() - 2.0).abs() < f64::EPSILON);
        assert!((state.win_rate() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_leaderboard_order_and_rank() {
        let mut registry = PlayerRegistry::new();
        registry.entry(pid(1)).total_wins = 2;
        registry.entry(pid(2)).total_wins = 5;
        registry.entry(pid(3)).total_wins = 1;

        let top = registry.top(LeaderboardMetric::Wins, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, pid(2));
        assert_eq!(top[1].0, pid(1));
        assert_eq!(registry.rank(LeaderboardMetric::Wins, pid(3)), Some(3));
        assert_eq!(registry.rank(LeaderboardMetric::Wins, pid(4)), None);
    }
}
