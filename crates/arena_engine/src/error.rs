//! Engine error types.

use arena_core::{PartyId, PlayerId};

/// Errors returned by engine operations. Every error leaves engine state
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The requested lifecycle transition is not valid from the current state.
    #[error("cannot {action} while session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// Not enough connected players to start without `force`.
    #[error("not enough players: {online} online, {required} required")]
    NotEnoughPlayers { online: usize, required: usize },

    /// The kit cooldown has not yet elapsed.
    #[error("kit cooldown active for {remaining_ms}ms")]
    CooldownActive { remaining_ms: u64 },

    /// The party has reached its size limit.
    #[error("party {0} is full")]
    PartyFull(PartyId),

    /// The player already belongs to a party.
    #[error("{0} is already in a party")]
    AlreadyInParty(PlayerId),

    /// The player does not belong to any party.
    #[error("{0} is not in a party")]
    NotInParty(PlayerId),

    /// The player has no pending invite to the party.
    #[error("{player} has no invite to party {party}")]
    NoInvite { player: PlayerId, party: PartyId },

    /// Only the party leader may do this.
    #[error("{0} is not the party leader")]
    NotLeader(PlayerId),

    /// The player may not take part in the event.
    #[error("{0} is not eligible")]
    NotEligible(PlayerId),

    /// An unknown party, loadout, slot or offline player was referenced.
    #[error("missing resource: {0}")]
    MissingResource(String),
}

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be (de)serialised.
    #[error("store format error: {0}")]
    Format(#[from] serde_json::Error),
}
