//! Observer registry — tracks joined observer processes and their liveness.
//!
//! Each joined observer maps to the player entity it controls. Observers
//! that stop sending heartbeats are expired and their entity despawned.

use std::collections::HashMap;
use std::time::Duration;

use combat_core::{CombatIdentity, PlayerEntity};

/// A joined observer process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverInfo {
    /// The observer's combat identity.
    pub identity: CombatIdentity,
    /// The entity it controls.
    pub entity: PlayerEntity,
    /// Host clock time of the last message from it.
    pub last_seen: Duration,
}

/// Registry of observers keyed by instance id.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    observers: HashMap<String, ObserverInfo>,
}

impl ObserverRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Any other observer bound to the same entity
    /// (an earlier connection of the same account) is dropped.
    pub fn register(
        &mut self,
        observer_id: &str,
        identity: CombatIdentity,
        entity: PlayerEntity,
        now: Duration,
    ) {
        self.observers
            .retain(|id, o| o.entity != entity || id == observer_id);
        self.observers.insert(
            observer_id.to_string(),
            ObserverInfo {
                identity,
                entity,
                last_seen: now,
            },
        );
    }

    /// Record activity from an observer.
    ///
    /// Returns the observer if it is registered.
    pub fn touch(&mut self, observer_id: &str, now: Duration) -> Option<ObserverInfo> {
        let info = self.observers.get_mut(observer_id)?;
        info.last_seen = info.last_seen.max(now);
        Some(*info)
    }

    /// Remove an observer.
    pub fn remove(&mut self, observer_id: &str) -> Option<ObserverInfo> {
        self.observers.remove(observer_id)
    }

    /// Remove and return every observer silent for longer than `timeout`.
    pub fn expire(&mut self, now: Duration, timeout: Duration) -> Vec<(String, ObserverInfo)> {
        let stale: Vec<String> = self
            .observers
            .iter()
            .filter(|(_, o)| now.saturating_sub(o.last_seen) > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        stale
            .into_iter()
            .filter_map(|id| self.observers.remove(&id).map(|o| (id, o)))
            .collect()
    }

    /// Number of joined observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }
}
