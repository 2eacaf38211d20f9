//! Stable combat identities used for damage and kill attribution.
//!
//! A [`CombatIdentity`] is assigned once when a player's session is first
//! established and survives reconnects, so a kill credited to a player stays
//! correct even if that player disconnects before the death screen renders.

use serde::{Deserialize, Serialize};

/// A globally stable player identifier.
///
/// Unlike a [`PlayerEntity`](crate::PlayerEntity), which names one spawned
/// body for the lifetime of a connection, an identity is never reused while
/// any attribution to it may still be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatIdentity(pub u64);

impl CombatIdentity {
    /// The unset identity. Hits reported with it are credited to the environment.
    pub const UNSET: CombatIdentity = CombatIdentity(0);

    /// Create an identity from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` unless this is [`CombatIdentity::UNSET`].
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for CombatIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

/// Who is credited with a kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Killer {
    /// Another player (or the victim itself).
    Player(CombatIdentity),
    /// Falls, hazards, or any hit reported without a source.
    Environment,
}

impl Killer {
    /// Attribute a kill to the source of the final hit.
    #[must_use]
    pub const fn from_source(source: CombatIdentity) -> Self {
        if source.is_set() {
            Self::Player(source)
        } else {
            Self::Environment
        }
    }

    /// Returns the credited identity, if a player made the kill.
    #[must_use]
    pub const fn identity(self) -> Option<CombatIdentity> {
        match self {
            Self::Player(id) => Some(id),
            Self::Environment => None,
        }
    }
}

/// Display data for an identity.
///
/// Avatars are fetched by `account_id` from the platform, outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Platform account the identity was claimed for.
    pub account_id: u64,
    /// Name shown in kill feeds and on the death screen.
    pub display_name: String,
}

impl PlayerProfile {
    /// Create a new profile.
    #[must_use]
    pub fn new(account_id: u64, display_name: impl Into<String>) -> Self {
        Self {
            account_id,
            display_name: display_name.into(),
        }
    }
}

/// Allocates monotonically increasing identities. Never recycles.
#[derive(Debug)]
pub struct IdentityAllocator {
    next_id: u64,
}

impl IdentityAllocator {
    /// Creates a new allocator. IDs start at 1 (0 is [`CombatIdentity::UNSET`]).
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh identity.
    pub fn allocate(&mut self) -> CombatIdentity {
        let id = self.next_id;
        self.next_id += 1;
        CombatIdentity(id)
    }

    /// Returns the number of identities handed out so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for IdentityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_identity() {
        assert!(!CombatIdentity::UNSET.is_set());
        assert!(CombatIdentity::from_raw(7).is_set());
    }

    #[test]
    fn test_killer_from_unset_source_is_environment() {
        assert_eq!(Killer::from_source(CombatIdentity::UNSET), Killer::Environment);
        assert_eq!(Killer::Environment.identity(), None);
    }

    #[test]
    fn test_killer_from_player_source() {
        let killer = Killer::from_source(CombatIdentity(3));
        assert_eq!(killer, Killer::Player(CombatIdentity(3)));
        assert_eq!(killer.identity(), Some(CombatIdentity(3)));
    }

    #[test]
    fn test_allocator_never_hands_out_unset() {
        let mut alloc = IdentityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert!(a.is_set());
        assert_ne!(a, b);
        assert_eq!(alloc.count(), 2);
    }

    #[test]
    fn test_killer_serialization_roundtrip() {
        let killer = Killer::Player(CombatIdentity(42));
        let bytes = rmp_serde::to_vec(&killer).unwrap();
        let restored: Killer = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(killer, restored);
    }
}
