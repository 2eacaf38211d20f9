//! Change notifications raised on observers.
//!
//! Two layers are exposed:
//!
//! - [`FieldChanged`] — raw per-field notifications delivered to callbacks
//!   registered with [`Subscribers::subscribe`].
//! - [`CombatEvent`] — the gameplay-level view (`HealthChanged`, `Died`,
//!   `Revived`, …) returned from every replica apply, consumed by UI and the
//!   death lifecycle.

use std::collections::BTreeMap;

use crate::entity::PlayerEntity;
use crate::field::{FieldId, FieldValue};
use crate::identity::{CombatIdentity, Killer};

/// A replicated field took a new value on this observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldChanged {
    /// The entity whose field changed.
    pub entity: PlayerEntity,
    /// The value before the change.
    pub old: FieldValue,
    /// The value after the change.
    pub new: FieldValue,
}

impl FieldChanged {
    /// The field that changed.
    #[must_use]
    pub const fn field(&self) -> FieldId {
        self.new.field()
    }

    /// Returns `true` if only the sequence number moved.
    ///
    /// A dead life state replaced by a newer dead life state is never a
    /// no-op: the entity was revived and killed again in between.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        match (self.old, self.new) {
            (FieldValue::Life(old), FieldValue::Life(new)) => old == new && new.is_alive(),
            (old, new) => old == new,
        }
    }
}

/// Gameplay-level combat events, in the order they were applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatEvent {
    /// A player entity started being replicated.
    Spawned {
        /// The new entity.
        entity: PlayerEntity,
        /// Its identity.
        identity: CombatIdentity,
    },
    /// Health changed. Drives health bar and damage/heal flashes.
    HealthChanged {
        /// The entity.
        entity: PlayerEntity,
        /// Health before.
        old: f32,
        /// Health after.
        new: f32,
    },
    /// The entity died.
    Died {
        /// The entity.
        entity: PlayerEntity,
        /// Who gets the kill.
        killer: Killer,
    },
    /// The entity was revived by the authority.
    Revived {
        /// The entity.
        entity: PlayerEntity,
    },
    /// A player entity stopped being replicated.
    Despawned {
        /// The removed entity.
        entity: PlayerEntity,
    },
}

impl CombatEvent {
    /// The entity the event concerns.
    #[must_use]
    pub const fn entity(&self) -> PlayerEntity {
        match *self {
            Self::Spawned { entity, .. }
            | Self::HealthChanged { entity, .. }
            | Self::Died { entity, .. }
            | Self::Revived { entity }
            | Self::Despawned { entity } => entity,
        }
    }

    /// Translate an accepted field change into gameplay events.
    ///
    /// A dead-to-dead life change means the revive in between was missed,
    /// so it yields `Revived` followed by the new `Died`.
    #[must_use]
    pub fn from_change(change: &FieldChanged) -> Vec<Self> {
        let entity = change.entity;
        match (change.old, change.new) {
            (FieldValue::Health(old), FieldValue::Health(new)) if old != new => {
                vec![Self::HealthChanged { entity, old, new }]
            }
            (FieldValue::Life(old), FieldValue::Life(new)) => match (old.is_alive(), new.killer()) {
                (true, Some(killer)) => vec![Self::Died { entity, killer }],
                (false, Some(killer)) => vec![Self::Revived { entity }, Self::Died { entity, killer }],
                (false, None) => vec![Self::Revived { entity }],
                (true, None) => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

/// Handle returned by [`Subscribers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&FieldChanged) + Send>;

/// Per-field callback registry.
#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    callbacks: BTreeMap<SubscriptionId, (FieldId, Callback)>,
}

impl Subscribers {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for changes to `field` on any entity.
    pub fn subscribe<F>(&mut self, field: FieldId, callback: F) -> SubscriptionId
    where
        F: FnMut(&FieldChanged) + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.callbacks.insert(id, (field, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns `true` if it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.callbacks.remove(&id).is_some()
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Invoke every callback registered for the change's field.
    pub fn dispatch(&mut self, change: &FieldChanged) {
        let field = change.field();
        for (subscribed, callback) in self.callbacks.values_mut() {
            if *subscribed == field {
                callback(change);
            }
        }
    }
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}
