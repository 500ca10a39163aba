//! Persisted per-player record.
//!
//! This is the layout owned by the external store: only the fields that
//! survive across sessions. It is loaded at startup and flushed on shutdown
//! and on every disconnect.

use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;

/// Number of loadout selection slots per player.
pub const LOADOUT_SLOTS: usize = 3;

/// The persistent slice of a player's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub id: PlayerId,
    #[serde(default)]
    pub total_wins: u32,
    #[serde(default)]
    pub total_kills: u32,
    #[serde(default)]
    pub total_deaths: u32,
    #[serde(default)]
    pub total_points: u64,
    #[serde(default)]
    pub best_kill_streak: u32,
    /// Loadout names per slot; an empty string is an empty slot.
    #[serde(default)]
    pub selected_loadouts: [String; LOADOUT_SLOTS],
    #[serde(default)]
    pub selected_title: Option<String>,
}

impl PersistedRecord {
    /// An all-zero record for `id`.
    #[must_use]
    pub fn empty(id: PlayerId) -> Self {
        Self {
            id,
            total_wins: 0,
            total_kills: 0,
            total_deaths: 0,
            total_points: 0,
            best_kill_streak: 0,
            selected_loadouts: Default::default(),
            selected_title: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default_to_zero() {
        let json = r#"{"id":"00000000-0000-0000-0000-000000000005","total_wins":3}"#;
        let record: PersistedRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.total_wins, 3);
        assert_eq!(record.total_kills, 0);
        assert!(record.selected_loadouts.iter().all(String::is_empty));
        assert_eq!(record.selected_title, None);
    }
}
