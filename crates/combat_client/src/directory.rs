//! Identity directory — resolves combat identities to display data.
//!
//! Profiles are recorded from spawn broadcasts and snapshots and are never
//! removed, so a kill credited to a player who has since left still
//! resolves to a name.

use dashmap::DashMap;

use combat_core::{CombatIdentity, PlayerProfile};

/// Lookup of player display data by identity.
///
/// Shared between the session task and anything rendering names (kill
/// feed, scoreboard), so implementations must be thread-safe.
pub trait IdentityDirectory: Send + Sync {
    /// Store or refresh a profile.
    fn record(&self, identity: CombatIdentity, profile: PlayerProfile);

    /// Look up a profile.
    fn resolve(&self, identity: CombatIdentity) -> Option<PlayerProfile>;

    /// Display name for an identity, or a placeholder.
    fn display_name(&self, identity: CombatIdentity) -> String {
        self.resolve(identity)
            .map_or_else(|| identity.to_string(), |p| p.display_name)
    }
}

/// Concurrent in-memory directory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    profiles: DashMap<CombatIdentity, PlayerProfile>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Returns `true` if no identity is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl IdentityDirectory for InMemoryDirectory {
    fn record(&self, identity: CombatIdentity, profile: PlayerProfile) {
        self.profiles.insert(identity, profile);
    }

    fn resolve(&self, identity: CombatIdentity) -> Option<PlayerProfile> {
        self.profiles.get(&identity).map(|p| p.value().clone())
    }
}
