//! Win condition evaluation.
//!
//! Pure function of the alive roster, the match mode and party membership.
//! The engine decides when to call it and what to do with the verdict.

use std::collections::BTreeSet;

use arena_core::{MatchMode, PartyId, PlayerId, Winner};

use crate::party::PartyRegistry;

/// Which side an alive player fights for in group mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Party(PartyId),
    Solo(PlayerId),
}

impl GroupKey {
    #[must_use]
    pub fn of(player: PlayerId, parties: &PartyRegistry) -> Self {
        parties
            .party_of(player)
            .map_or(Self::Solo(player), |group| Self::Party(group.id))
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WinVerdict {
    /// More than one side is still alive.
    Undecided,
    /// One side remains.
    Winner(Winner),
    /// Nobody is alive.
    NoWinner,
}

impl WinVerdict {
    /// Players credited with one win each.
    #[must_use]
    pub fn credited(&self) -> Vec<PlayerId> {
        match self {
            Self::Winner(Winner::Player(id)) => vec![*id],
            Self::Winner(Winner::Party { members, .. }) => members.clone(),
            Self::Undecided | Self::NoWinner => Vec::new(),
        }
    }
}

/// Evaluate the alive roster.
#[must_use]
pub fn evaluate(mode: MatchMode, alive: &BTreeSet<PlayerId>, parties: &PartyRegistry) -> WinVerdict {
    match mode {
        MatchMode::Individual => evaluate_individual(alive),
        MatchMode::Group => evaluate_group(alive, parties),
    }
}

fn evaluate_individual(alive: &BTreeSet<PlayerId>) -> WinVerdict {
    if alive.len() > 1 {
        return WinVerdict::Undecided;
    }
    alive
        .first()
        .map_or(WinVerdict::NoWinner, |id| WinVerdict::Winner(Winner::Player(*id)))
}

fn evaluate_group(alive: &BTreeSet<PlayerId>, parties: &PartyRegistry) -> WinVerdict {
    let keys: BTreeSet<GroupKey> = alive.iter().map(|id| GroupKey::of(*id, parties)).collect();
    if keys.len() > 1 {
        return WinVerdict::Undecided;
    }
    match keys.first() {
        None => WinVerdict::NoWinner,
        Some(GroupKey::Solo(id)) => WinVerdict::Winner(Winner::Player(*id)),
        Some(GroupKey::Party(party)) => match parties.get(*party) {
            Some(group) => WinVerdict::Winner(Winner::Party {
                party: group.id,
                leader: group.leader,
                members: group.members.iter().copied().collect(),
            }),
            None => WinVerdict::NoWinner,
        },
    }
}
