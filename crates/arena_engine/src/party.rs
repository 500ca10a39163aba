//! Party aggregator.
//!
//! Parties are small player groups that share a win in group mode and do
//! not damage each other unless friendly fire is on. A player belongs to at
//! most one party. The leader is always a member; a party whose leader
//! leaves, or whose membership empties, is removed.

use std::collections::{BTreeSet, HashMap};

use arena_core::{PartyId, PlayerId};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::EngineError;

/// Highlight color assigned to a party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PartyColor {
    Aqua,
    Green,
    Yellow,
    LightPurple,
    Red,
    Blue,
    Gold,
    DarkGreen,
    DarkPurple,
}

impl PartyColor {
    /// Palette in assignment order.
    pub const PALETTE: [PartyColor; 9] = [
        Self::Aqua,
        Self::Green,
        Self::Yellow,
        Self::LightPurple,
        Self::Red,
        Self::Blue,
        Self::Gold,
        Self::DarkGreen,
        Self::DarkPurple,
    ];
}

/// A party and its pending invites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyGroup {
    pub id: PartyId,
    pub leader: PlayerId,
    pub members: BTreeSet<PlayerId>,
    pub invites: BTreeSet<PlayerId>,
    pub color: PartyColor,
}

impl PartyGroup {
    #[must_use]
    pub fn is_member(&self, player: PlayerId) -> bool {
        self.members.contains(&player)
    }

    #[must_use]
    pub fn is_leader(&self, player: PlayerId) -> bool {
        self.leader == player
    }
}

/// All live parties plus the player → party index.
#[derive(Debug)]
pub struct PartyRegistry {
    parties: HashMap<PartyId, PartyGroup>,
    membership: HashMap<PlayerId, PartyId>,
    max_size: usize,
    next_color: usize,
}

impl PartyRegistry {
    /// Create an empty registry with the given party size limit.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            parties: HashMap::new(),
            membership: HashMap::new(),
            max_size: max_size.max(1),
            next_color: 0,
        }
    }

    fn next_color(&mut self) -> PartyColor {
        let color = PartyColor::PALETTE[self.next_color % PartyColor::PALETTE.len()];
        self.next_color += 1;
        color
    }

    /// Create a party led by `leader`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyInParty`] if the leader is partied.
    pub fn create(&mut self, leader: PlayerId) -> Result<PartyId, EngineError> {
        if self.membership.contains_key(&leader) {
            return Err(EngineError::AlreadyInParty(leader));
        }
        let id = PartyId::new_v4();
        let color = self.next_color();
        self.parties.insert(
            id,
            PartyGroup {
                id,
                leader,
                members: BTreeSet::from([leader]),
                invites: BTreeSet::new(),
                color,
            },
        );
        self.membership.insert(leader, id);
        info!(party = %id, %leader, ?color, "party created");
        Ok(id)
    }

    /// Invite `target` into `party`.
    ///
    /// # Errors
    ///
    /// Fails if the party is unknown, full, or the target is partied.
    pub fn invite(&mut self, party: PartyId, target: PlayerId) -> Result<(), EngineError> {
        if self.membership.contains_key(&target) {
            return Err(EngineError::AlreadyInParty(target));
        }
        let max_size = self.max_size;
        let group = self
            .parties
            .get_mut(&party)
            .ok_or_else(|| EngineError::MissingResource(format!("party {party}")))?;
        if group.members.len() >= max_size {
            return Err(EngineError::PartyFull(party));
        }
        group.invites.insert(target);
        debug!(%party, %target, "party invite sent");
        Ok(())
    }

    /// Accept a pending invite.
    ///
    /// # Errors
    ///
    /// Fails if the party is unknown, there is no invite, the party is full,
    /// or the player is already partied.
    pub fn accept(&mut self, player: PlayerId, party: PartyId) -> Result<(), EngineError> {
        let max_size = self.max_size;
        let already_partied = self.membership.contains_key(&player);
        let group = self
            .parties
            .get_mut(&party)
            .ok_or_else(|| EngineError::MissingResource(format!("party {party}")))?;
        if !group.invites.contains(&player) {
            return Err(EngineError::NoInvite { player, party });
        }
        if group.members.len() >= max_size {
            return Err(EngineError::PartyFull(party));
        }
        if already_partied {
            return Err(EngineError::AlreadyInParty(player));
        }
        group.invites.remove(&player);
        group.members.insert(player);
        self.membership.insert(player, party);
        info!(%party, %player, "joined party");
        Ok(())
    }

    /// Leave the current party. A leaving leader disbands it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotInParty`] if the player has no party.
    pub fn leave(&mut self, player: PlayerId) -> Result<(), EngineError> {
        let party = *self
            .membership
            .get(&player)
            .ok_or(EngineError::NotInParty(player))?;
        self.membership.remove(&player);

        let Some(group) = self.parties.get_mut(&party) else {
            return Ok(());
        };
        group.members.remove(&player);
        if group.is_leader(player) || group.members.is_empty() {
            self.disband(party);
        } else {
            debug!(%party, %player, "left party");
        }
        Ok(())
    }

    /// Remove `target` from the leader's party.
    ///
    /// # Errors
    ///
    /// Fails unless `leader` leads a party that has `target` as a member.
    pub fn kick(&mut self, leader: PlayerId, target: PlayerId) -> Result<(), EngineError> {
        let group = self
            .party_of(leader)
            .ok_or(EngineError::NotInParty(leader))?;
        if !group.is_leader(leader) {
            return Err(EngineError::NotLeader(leader));
        }
        if !group.is_member(target) {
            return Err(EngineError::NotInParty(target));
        }
        self.leave(target)
    }

    /// Remove a party and release every member. Unknown ids are ignored.
    pub fn disband(&mut self, party: PartyId) -> bool {
        let Some(group) = self.parties.remove(&party) else {
            return false;
        };
        for member in &group.members {
            self.membership.remove(member);
        }
        info!(%party, members = group.members.len(), "party disbanded");
        true
    }

    /// Remove every party.
    pub fn disband_all(&mut self) {
        let ids: Vec<PartyId> = self.parties.keys().copied().collect();
        for id in ids {
            self.disband(id);
        }
    }

    /// Returns the party `player` belongs to.
    #[must_use]
    pub fn party_of(&self, player: PlayerId) -> Option<&PartyGroup> {
        self.membership
            .get(&player)
            .and_then(|id| self.parties.get(id))
    }

    /// Returns the party with id `party`.
    #[must_use]
    pub fn get(&self, party: PartyId) -> Option<&PartyGroup> {
        self.parties.get(&party)
    }

    /// Returns `true` if both players are in the same party.
    #[must_use]
    pub fn same_party(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.membership.get(&a), self.membership.get(&b)) {
            (Some(pa), Some(pb)) => pa == pb,
            _ => false,
        }
    }

    /// Returns an iterator over all live parties.
    pub fn iter(&self) -> impl Iterator<Item = &PartyGroup> {
        self.parties.values()
    }

    /// Returns the number of live parties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u128) -> PlayerId {
        PlayerId::from_u128(n)
    }

    fn party_of_two(registry: &mut PartyRegistry) -> PartyId {
        let id = registry.create(pid(1)).unwrap();
        registry.invite(id, pid(2)).unwrap();
        registry.accept(pid(2), id).unwrap();
        id
    }

    #[test]
    fn test_create_and_membership() {
        let mut registry = PartyRegistry::new(4);
        let id = party_of_two(&mut registry);
        let group = registry.get(id).unwrap();
        assert!(group.is_leader(pid(1)));
        assert!(group.is_member(pid(2)));
        assert!(group.invites.is_empty());
        assert!(registry.same_party(pid(1), pid(2)));
        assert!(!registry.same_party(pid(1), pid(3)));
    }

    #[test]
    fn test_create_twice_fails() {
        let mut registry = PartyRegistry::new(4);
        registry.create(pid(1)).unwrap();
        assert_eq!(
            registry.create(pid(1)),
            Err(EngineError::AlreadyInParty(pid(1)))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invite_partied_player_fails_without_mutation() {
        let mut registry = PartyRegistry::new(4);
        let a = registry.create(pid(1)).unwrap();
        let b = registry.create(pid(2)).unwrap();

        let before = registry.get(a).cloned();
        assert_eq!(
            registry.invite(a, pid(2)),
            Err(EngineError::AlreadyInParty(pid(2)))
        );
        assert_eq!(registry.get(a).cloned(), before);
        assert_eq!(registry.party_of(pid(2)).map(|g| g.id), Some(b));
    }

    #[test]
    fn test_accept_requires_invite() {
        let mut registry = PartyRegistry::new(4);
        let id = registry.create(pid(1)).unwrap();
        assert_eq!(
            registry.accept(pid(2), id),
            Err(EngineError::NoInvite {
                player: pid(2),
                party: id
            })
        );
    }

    #[test]
    fn test_full_party_rejects_invite_and_accept() {
        let mut registry = PartyRegistry::new(2);
        let id = registry.create(pid(1)).unwrap();
        registry.invite(id, pid(2)).unwrap();
        registry.invite(id, pid(3)).unwrap();
        registry.accept(pid(2), id).unwrap();

        assert_eq!(registry.accept(pid(3), id), Err(EngineError::PartyFull(id)));
        assert_eq!(registry.invite(id, pid(4)), Err(EngineError::PartyFull(id)));
    }

    #[test]
    fn test_member_leave_keeps_party() {
        let mut registry = PartyRegistry::new(4);
        let id = party_of_two(&mut registry);
        registry.leave(pid(2)).unwrap();
        assert!(registry.get(id).is_some());
        assert!(registry.party_of(pid(2)).is_none());
    }

    #[test]
    fn test_leader_leave_disbands() {
        let mut registry = PartyRegistry::new(4);
        let id = party_of_two(&mut registry);
        registry.leave(pid(1)).unwrap();
        assert!(registry.get(id).is_none());
        assert!(registry.party_of(pid(2)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_leave_without_party_fails() {
        let mut registry = PartyRegistry::new(4);
        assert_eq!(registry.leave(pid(5)), Err(EngineError::NotInParty(pid(5))));
    }

    #[test]
    fn test_kick_requires_leader() {
        let mut registry = PartyRegistry::new(4);
        let id = party_of_two(&mut registry);
        assert_eq!(
            registry.kick(pid(2), pid(1)),
            Err(EngineError::NotLeader(pid(2)))
        );
        registry.kick(pid(1), pid(2)).unwrap();
        assert!(!registry.get(id).unwrap().is_member(pid(2)));
    }

    #[test]
    fn test_colors_round_robin() {
        let mut registry = PartyRegistry::new(4);
        let colors: Vec<PartyColor> = (0..10)
            .map(|n| {
                let id = registry.create(pid(100 + n)).unwrap();
                registry.get(id).unwrap().color
            })
            .collect();
        assert_eq!(colors[0], PartyColor::Aqua);
        assert_eq!(colors[8], PartyColor::DarkPurple);
        assert_eq!(colors[9], PartyColor::Aqua);
    }

    #[test]
    fn test_disband_all() {
        let mut registry = PartyRegistry::new(4);
        party_of_two(&mut registry);
        registry.create(pid(3)).unwrap();
        registry.disband_all();
        assert!(registry.is_empty());
        assert!(registry.party_of(pid(3)).is_none());
    }
}
