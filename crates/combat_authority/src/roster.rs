//! Identity roster — stable combat identities per platform account.
//!
//! The authority claims one [`CombatIdentity`] per account the first time
//! it joins. Reconnects with the same account get the same identity back, and
//! identities are never released during a match, so attribution to a player
//! who has left still resolves.

use std::collections::HashMap;

use combat_core::{CombatIdentity, IdentityAllocator, PlayerProfile};

/// Accounts and profiles known to the authority.
#[derive(Debug, Default)]
pub struct Roster {
    allocator: IdentityAllocator,
    by_account: HashMap<u64, CombatIdentity>,
    profiles: HashMap<CombatIdentity, PlayerProfile>,
}

impl Roster {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the identity for an account, allocating one on first sight.
    ///
    /// The stored display name is refreshed on every claim.
    pub fn claim(&mut self, account_id: u64, display_name: &str) -> CombatIdentity {
        let identity = *self
            .by_account
            .entry(account_id)
            .or_insert_with(|| self.allocator.allocate());
        self.profiles
            .insert(identity, PlayerProfile::new(account_id, display_name));
        identity
    }

    /// The identity claimed for an account, if any.
    #[must_use]
    pub fn identity_for(&self, account_id: u64) -> Option<CombatIdentity> {
        self.by_account.get(&account_id).copied()
    }

    /// Display data for an identity.
    #[must_use]
    pub fn profile(&self, identity: CombatIdentity) -> Option<&PlayerProfile> {
        self.profiles.get(&identity)
    }

    /// Number of identities ever claimed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Returns `true` if no identity has been claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
