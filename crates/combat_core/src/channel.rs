//! Authority side of the replicated-state channel.
//!
//! [`AuthorityChannel`] is the only type that can write replicated combat
//! fields. Only the process holding authority constructs one; observers hold
//! an [`ObserverReplica`](crate::ObserverReplica) instead, which has no write
//! path at all.
//!
//! Every accepted write is queued as a [`Broadcast`] in the outbox. The owner
//! drains the outbox once per tick, feeds it to its own colocated replica,
//! and fans it out to remote observers, so the authority reacts to its own
//! writes through exactly the same code as everyone else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::entity::PlayerEntity;
use crate::field::{ChangeSet, FieldValue, VitalFields};
use crate::identity::{CombatIdentity, PlayerProfile};
use crate::snapshot::{EntitySnapshot, Snapshot};
use crate::state::{CombatState, StateError};

/// A one-to-many notification of an authoritative change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Broadcast {
    /// A player entity joined the match.
    Spawned(EntitySnapshot),
    /// Replicated fields of one entity changed.
    Changed(ChangeSet),
    /// A player entity left the match.
    Despawned {
        /// The removed entity.
        entity: PlayerEntity,
    },
}

impl Broadcast {
    /// The entity this broadcast concerns.
    #[must_use]
    pub fn entity(&self) -> PlayerEntity {
        match self {
            Self::Spawned(snapshot) => snapshot.entity,
            Self::Changed(set) => set.entity,
            Self::Despawned { entity } => *entity,
        }
    }
}

/// Errors raised by the authority write path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    /// The entity is not spawned.
    #[error("unknown entity {0}")]
    UnknownEntity(PlayerEntity),

    /// The entity is already spawned.
    #[error("entity {0} already spawned")]
    AlreadySpawned(PlayerEntity),

    /// The write would break a combat-state invariant.
    #[error("write to {entity} rejected: {source}")]
    InvalidState {
        /// The entity written to.
        entity: PlayerEntity,
        /// The violated invariant.
        source: StateError,
    },
}

#[derive(Debug)]
struct AuthoritativeEntity {
    identity: CombatIdentity,
    profile: PlayerProfile,
    fields: VitalFields,
}

/// The authoritative copy of every player's replicated fields.
#[derive(Debug, Default)]
pub struct AuthorityChannel {
    entities: BTreeMap<PlayerEntity, AuthoritativeEntity>,
    outbox: Vec<Broadcast>,
}

impl AuthorityChannel {
    /// Create an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start replicating a new player at full health.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AlreadySpawned`] for a duplicate entity and
    /// [`ChannelError::InvalidState`] for an unusable `max_health`.
    pub fn spawn(
        &mut self,
        entity: PlayerEntity,
        identity: CombatIdentity,
        profile: PlayerProfile,
        max_health: f32,
    ) -> Result<(), ChannelError> {
        if self.entities.contains_key(&entity) {
            return Err(ChannelError::AlreadySpawned(entity));
        }
        CombatState::full(max_health)
            .validate()
            .map_err(|source| ChannelError::InvalidState { entity, source })?;

        let record = AuthoritativeEntity {
            identity,
            profile,
            fields: VitalFields::full(max_health),
        };
        let snapshot =
            EntitySnapshot::capture(entity, identity, record.profile.clone(), &record.fields);
        self.entities.insert(entity, record);
        self.outbox.push(Broadcast::Spawned(snapshot));
        debug!(%entity, %identity, max_health, "entity spawned");
        Ok(())
    }

    /// Stop replicating a player.
    ///
    /// Returns `true` if the entity existed.
    pub fn despawn(&mut self, entity: PlayerEntity) -> bool {
        if self.entities.remove(&entity).is_some() {
            self.outbox.push(Broadcast::Despawned { entity });
            debug!(%entity, "entity despawned");
            true
        } else {
            false
        }
    }

    /// Write one or more fields of an entity as a single atomic change set.
    ///
    /// The resulting state is validated before anything is stored, so a
    /// rejected publish leaves the fields untouched. Values equal to the
    /// current ones are skipped; if nothing changes no broadcast is queued
    /// and `Ok(None)` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::UnknownEntity`] or
    /// [`ChannelError::InvalidState`].
    pub fn publish(
        &mut self,
        entity: PlayerEntity,
        values: &[FieldValue],
    ) -> Result<Option<ChangeSet>, ChannelError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(ChannelError::UnknownEntity(entity))?;

        record
            .fields
            .candidate(values)
            .validate()
            .map_err(|source| ChannelError::InvalidState { entity, source })?;

        let changes: Vec<_> = values
            .iter()
            .filter_map(|value| record.fields.write(*value))
            .collect();
        if changes.is_empty() {
            return Ok(None);
        }

        trace!(%entity, changes = changes.len(), "published change set");
        let set = ChangeSet { entity, changes };
        self.outbox.push(Broadcast::Changed(set.clone()));
        Ok(Some(set))
    }

    /// The authoritative state of an entity.
    #[must_use]
    pub fn state(&self, entity: PlayerEntity) -> Option<CombatState> {
        self.entities.get(&entity).map(|r| r.fields.state())
    }

    /// The identity an entity was spawned for.
    #[must_use]
    pub fn identity(&self, entity: PlayerEntity) -> Option<CombatIdentity> {
        self.entities.get(&entity).map(|r| r.identity)
    }

    /// Returns `true` if the entity is spawned.
    #[must_use]
    pub fn contains(&self, entity: PlayerEntity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Iterate over all spawned entities in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = PlayerEntity> + '_ {
        self.entities.keys().copied()
    }

    /// Number of spawned entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Capture the full authoritative state for a late-join sync.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entities: self
                .entities
                .iter()
                .map(|(&entity, r)| {
                    EntitySnapshot::capture(entity, r.identity, r.profile.clone(), &r.fields)
                })
                .collect(),
        }
    }

    /// Take every queued broadcast, oldest first.
    pub fn drain_outbox(&mut self) -> Vec<Broadcast> {
        std::mem::take(&mut self.outbox)
    }

    /// Number of queued broadcasts.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Killer;
    use crate::state::LifeState;

    fn spawned() -> (AuthorityChannel, PlayerEntity) {
        let mut channel = AuthorityChannel::new();
        let entity = PlayerEntity(1);
        channel
            .spawn(
                entity,
                CombatIdentity(10),
                PlayerProfile::new(7, "alice"),
                100.0,
            )
            .unwrap();
        (channel, entity)
    }

    #[test]
    fn test_spawn_queues_broadcast() {
        let (mut channel, entity) = spawned();
        let out = channel.drain_outbox();
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Broadcast::Spawned(s) if s.entity == entity));
        assert_eq!(channel.pending(), 0);
    }

    #[test]
    fn test_duplicate_spawn_rejected() {
        let (mut channel, entity) = spawned();
        let err = channel
            .spawn(entity, CombatIdentity(11), PlayerProfile::new(8, "bob"), 100.0)
            .unwrap_err();
        assert_eq!(err, ChannelError::AlreadySpawned(entity));
    }

    #[test]
    fn test_publish_assigns_sequences() {
        let (mut channel, entity) = spawned();
        channel.drain_outbox();

        let set = channel
            .publish(entity, &[FieldValue::Health(70.0)])
            .unwrap()
            .unwrap();
        assert_eq!(set.changes[0].seq, 1);

        let set = channel
            .publish(entity, &[FieldValue::Health(40.0)])
            .unwrap()
            .unwrap();
        assert_eq!(set.changes[0].seq, 2);
        assert_eq!(channel.drain_outbox().len(), 2);
    }

    #[test]
    fn test_publish_unchanged_value_is_silent() {
        let (mut channel, entity) = spawned();
        channel.drain_outbox();
        assert_eq!(
            channel.publish(entity, &[FieldValue::Health(100.0)]).unwrap(),
            None
        );
        assert_eq!(channel.pending(), 0);
    }

    #[test]
    fn test_publish_rejects_zero_health_while_alive() {
        let (mut channel, entity) = spawned();
        channel.drain_outbox();
        let err = channel
            .publish(entity, &[FieldValue::Health(0.0)])
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidState { .. }));
        assert_eq!(channel.state(entity).unwrap().health, 100.0);
        assert_eq!(channel.pending(), 0);
    }

    #[test]
    fn test_publish_death_atomically() {
        let (mut channel, entity) = spawned();
        channel.drain_outbox();
        let set = channel
            .publish(
                entity,
                &[
                    FieldValue::Health(0.0),
                    FieldValue::Life(LifeState::Dead {
                        killer: Killer::Environment,
                    }),
                ],
            )
            .unwrap()
            .unwrap();
        assert_eq!(set.changes.len(), 2);
        assert!(!channel.state(entity).unwrap().alive());
    }

    #[test]
    fn test_publish_unknown_entity() {
        let mut channel = AuthorityChannel::new();
        let err = channel
            .publish(PlayerEntity(9), &[FieldValue::Health(1.0)])
            .unwrap_err();
        assert_eq!(err, ChannelError::UnknownEntity(PlayerEntity(9)));
    }

    #[test]
    fn test_despawn_queues_broadcast() {
        let (mut channel, entity) = spawned();
        channel.drain_outbox();
        assert!(channel.despawn(entity));
        assert!(!channel.despawn(entity));
        assert_eq!(
            channel.drain_outbox(),
            vec![Broadcast::Despawned { entity }]
        );
        assert!(channel.is_empty());
    }

    #[test]
    fn test_snapshot_carries_sequences() {
        let (mut channel, entity) = spawned();
        channel
            .publish(entity, &[FieldValue::Health(55.0)])
            .unwrap();
        let snapshot = channel.snapshot();
        let snap = snapshot.entity(entity).unwrap();
        assert_eq!(snap.health.seq, 1);
        assert_eq!(snap.health.value, 55.0);
        assert_eq!(snap.life.seq, 0);
        assert_eq!(snap.profile.display_name, "alice");
    }
}
