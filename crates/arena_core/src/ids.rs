//! Player and party identifiers.
//!
//! A [`PlayerId`] is the stable identity of a connected (or once-connected)
//! player. It is assigned by the hosting game server, never by the engine,
//! so the engine only wraps it. A [`PartyId`] is allocated by the engine when
//! a party is created.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique player identifier.
///
/// Player ids carry no data of their own. All per-player state lives in the
/// engine's player registry, keyed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Build a player id from a raw `u128`. Mostly useful in tests and tools
    /// that need deterministic ids.
    #[must_use]
    pub const fn from_u128(raw: u128) -> Self {
        Self(Uuid::from_u128(raw))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

/// A unique party identifier, allocated when a party is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyId(pub Uuid);

impl PartyId {
    /// Allocate a fresh random party id.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Party({})", self.0)
    }
}
