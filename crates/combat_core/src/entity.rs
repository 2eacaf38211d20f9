//! Player entity handles and allocation.
//!
//! A [`PlayerEntity`] names one spawned player body. All entity IDs are
//! allocated by the authority, so they are unique across every process in a
//! match.

use serde::{Deserialize, Serialize};

/// A spawned player entity.
///
/// Entities are despawned on disconnect or match end. A reconnecting player
/// keeps its [`CombatIdentity`](crate::CombatIdentity) but may get a new
/// entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerEntity(pub u64);

impl PlayerEntity {
    /// The null / invalid entity sentinel.
    pub const INVALID: PlayerEntity = PlayerEntity(0);

    /// Create an entity from a raw `u64` identifier.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) entity.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for PlayerEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

/// Allocates monotonically increasing entity IDs.
///
/// Lives on the authority. IDs are not recycled within a match, so a late
/// broadcast for a despawned entity can never land on a new one.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: u64,
}

impl EntityAllocator {
    /// Creates a new allocator. IDs start at 1 (0 is reserved for [`PlayerEntity::INVALID`]).
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh entity ID.
    pub fn allocate(&mut self) -> PlayerEntity {
        let id = self.next_id;
        self.next_id += 1;
        PlayerEntity(id)
    }

    /// Returns the number of entities allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_invalid() {
        assert!(!PlayerEntity::INVALID.is_valid());
        assert_eq!(PlayerEntity::INVALID.id(), 0);
    }

    #[test]
    fn test_allocator_produces_unique_ids() {
        let mut alloc = EntityAllocator::new();
        let e1 = alloc.allocate();
        let e2 = alloc.allocate();
        let e3 = alloc.allocate();
        assert_eq!(e1.id(), 1);
        assert_eq!(e2.id(), 2);
        assert_eq!(e3.id(), 3);
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_entity_display() {
        assert_eq!(PlayerEntity::from_raw(5).to_string(), "Player(5)");
    }
}
