//! Observer side of the replicated-state channel.
//!
//! An [`ObserverReplica`] holds read-only copies of every player's combat
//! state. Its only mutation path is applying a [`Broadcast`] or a
//! [`Snapshot`] received from the authority. The authority process runs one
//! too, fed from its own outbox, so side effects are single-sourced.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::channel::Broadcast;
use crate::entity::PlayerEntity;
use crate::events::{CombatEvent, FieldChanged, SubscriptionId, Subscribers};
use crate::field::{Accept, ChangeSet, FieldId, FieldValue, VitalFields};
use crate::identity::{CombatIdentity, PlayerProfile};
use crate::snapshot::{EntitySnapshot, Snapshot};
use crate::state::CombatState;

/// One player as seen by an observer.
#[derive(Debug, Clone)]
pub struct ObservedEntity {
    identity: CombatIdentity,
    profile: PlayerProfile,
    fields: VitalFields,
}

impl ObservedEntity {
    /// The identity the entity was spawned for.
    #[must_use]
    pub fn identity(&self) -> CombatIdentity {
        self.identity
    }

    /// Display data for the identity.
    #[must_use]
    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }

    /// The observed combat state.
    #[must_use]
    pub fn state(&self) -> CombatState {
        self.fields.state()
    }

    /// Sequence number currently held for a field.
    #[must_use]
    pub fn seq(&self, field: FieldId) -> u64 {
        match field {
            FieldId::Health => self.fields.health.seq(),
            FieldId::Life => self.fields.life.seq(),
            FieldId::LastDamageSource => self.fields.last_damage_source.seq(),
        }
    }
}

/// What applying a broadcast or snapshot did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Gameplay events raised, in apply order.
    pub events: Vec<CombatEvent>,
    /// The replica detected missing or inconsistent data and should request
    /// a full snapshot.
    pub needs_resync: bool,
}

impl ApplyReport {
    fn merge(&mut self, other: ApplyReport) {
        self.events.extend(other.events);
        self.needs_resync |= other.needs_resync;
    }
}

/// Read-only mirror of the authority's combat state.
#[derive(Debug, Default)]
pub struct ObserverReplica {
    entities: BTreeMap<PlayerEntity, ObservedEntity>,
    subscribers: Subscribers,
}

impl ObserverReplica {
    /// Create an empty replica.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for changes to `field` on any entity.
    ///
    /// Callbacks run synchronously after the whole change set has been
    /// applied, never before.
    pub fn subscribe<F>(&mut self, field: FieldId, callback: F) -> SubscriptionId
    where
        F: FnMut(&FieldChanged) + Send + 'static,
    {
        self.subscribers.subscribe(field, callback)
    }

    /// Remove a callback.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Apply one broadcast from the authority.
    pub fn apply(&mut self, broadcast: &Broadcast) -> ApplyReport {
        match broadcast {
            Broadcast::Spawned(snapshot) => self.reconcile(snapshot),
            Broadcast::Changed(set) => self.apply_changes(set),
            Broadcast::Despawned { entity } => self.remove(*entity),
        }
    }

    /// Replace the whole replica with a late-join snapshot.
    ///
    /// Entities missing from the snapshot are despawned; every field that
    /// differs raises the same events a live broadcast would have.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> ApplyReport {
        let mut report = ApplyReport::default();

        let gone: Vec<PlayerEntity> = self
            .entities
            .keys()
            .copied()
            .filter(|e| snapshot.entity(*e).is_none())
            .collect();
        for entity in gone {
            report.merge(self.remove(entity));
        }
        for entity in &snapshot.entities {
            report.merge(self.reconcile(entity));
        }

        debug!(
            entities = self.entities.len(),
            events = report.events.len(),
            "applied snapshot"
        );
        report
    }

    /// The observed state of an entity.
    #[must_use]
    pub fn state(&self, entity: PlayerEntity) -> Option<CombatState> {
        self.entities.get(&entity).map(ObservedEntity::state)
    }

    /// The observed entity record.
    #[must_use]
    pub fn entity(&self, entity: PlayerEntity) -> Option<&ObservedEntity> {
        self.entities.get(&entity)
    }

    /// Find the entity currently spawned for an identity.
    #[must_use]
    pub fn entity_for(&self, identity: CombatIdentity) -> Option<PlayerEntity> {
        self.entities
            .iter()
            .find(|(_, e)| e.identity == identity)
            .map(|(&entity, _)| entity)
    }

    /// Iterate over observed entities in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = (PlayerEntity, &ObservedEntity)> + '_ {
        self.entities.iter().map(|(&e, o)| (e, o))
    }

    /// Number of observed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if nothing is observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn apply_changes(&mut self, set: &ChangeSet) -> ApplyReport {
        let mut report = ApplyReport::default();
        let Some(observed) = self.entities.get_mut(&set.entity) else {
            debug!(entity = %set.entity, "change for unknown entity");
            report.needs_resync = true;
            return report;
        };

        let mut applied = Vec::with_capacity(set.changes.len());
        for change in &set.changes {
            match observed.fields.accept(change) {
                Accept::Stale => {
                    trace!(entity = %set.entity, seq = change.seq, "dropped stale change");
                }
                Accept::Applied { old, gap } => {
                    if gap {
                        debug!(entity = %set.entity, seq = change.seq, "sequence gap");
                        report.needs_resync = true;
                    }
                    applied.push(FieldChanged {
                        entity: set.entity,
                        old,
                        new: change.value,
                    });
                }
            }
        }

        if let Err(e) = observed.fields.state().validate() {
            warn!(entity = %set.entity, error = %e, "observed state inconsistent");
            report.needs_resync = true;
        }

        self.notify(&applied, &mut report);
        report
    }

    fn reconcile(&mut self, snapshot: &EntitySnapshot) -> ApplyReport {
        let mut report = ApplyReport::default();
        let entity = snapshot.entity;

        let Some(observed) = self.entities.get_mut(&entity) else {
            let fields = snapshot.to_fields();
            let life = *fields.life.value();
            self.entities.insert(
                entity,
                ObservedEntity {
                    identity: snapshot.identity,
                    profile: snapshot.profile.clone(),
                    fields,
                },
            );
            report.events.push(CombatEvent::Spawned {
                entity,
                identity: snapshot.identity,
            });
            if let Some(killer) = life.killer() {
                report.events.push(CombatEvent::Died { entity, killer });
            }
            return report;
        };

        observed.profile = snapshot.profile.clone();
        let offered = [
            (snapshot.health.seq, FieldValue::Health(snapshot.health.value)),
            (snapshot.life.seq, FieldValue::Life(snapshot.life.value)),
            (
                snapshot.last_damage_source.seq,
                FieldValue::LastDamageSource(snapshot.last_damage_source.value),
            ),
        ];
        let mut applied = Vec::new();
        for (seq, value) in offered {
            let change = crate::field::FieldChange { seq, value };
            if let Accept::Applied { old, .. } = observed.fields.accept(&change) {
                applied.push(FieldChanged {
                    entity,
                    old,
                    new: value,
                });
            }
        }
        self.notify(&applied, &mut report);
        report
    }

    fn remove(&mut self, entity: PlayerEntity) -> ApplyReport {
        let mut report = ApplyReport::default();
        if self.entities.remove(&entity).is_some() {
            report.events.push(CombatEvent::Despawned { entity });
        }
        report
    }

    fn notify(&mut self, applied: &[FieldChanged], report: &mut ApplyReport) {
        for change in applied.iter().filter(|c| !c.is_noop()) {
            self.subscribers.dispatch(change);
            report.events.extend(CombatEvent::from_change(change));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::channel::AuthorityChannel;
    use crate::identity::Killer;
    use crate::state::LifeState;

    fn authority() -> (AuthorityChannel, PlayerEntity) {
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

    fn kill(channel: &mut AuthorityChannel, entity: PlayerEntity, by: CombatIdentity) {
        channel
            .publish(
                entity,
                &[
                    FieldValue::LastDamageSource(Some(by)),
                    FieldValue::Health(0.0),
                    FieldValue::Life(LifeState::Dead {
                        killer: Killer::Player(by),
                    }),
                ],
            )
            .unwrap();
    }

    fn deliver(channel: &mut AuthorityChannel, replica: &mut ObserverReplica) -> ApplyReport {
        let mut report = ApplyReport::default();
        for b in channel.drain_outbox() {
            report.merge(replica.apply(&b));
        }
        report
    }

    #[test]
    fn test_spawn_broadcast_creates_entity() {
        let (mut channel, entity) = authority();
        let mut replica = ObserverReplica::new();
        let report = deliver(&mut channel, &mut replica);
        assert_eq!(
            report.events,
            vec![CombatEvent::Spawned {
                entity,
                identity: CombatIdentity(10)
            }]
        );
        assert_eq!(replica.state(entity), Some(CombatState::full(100.0)));
        assert_eq!(replica.entity_for(CombatIdentity(10)), Some(entity));
    }

    #[test]
    fn test_death_is_observed_together_with_zero_health() {
        let (mut channel, entity) = authority();
        let mut replica = ObserverReplica::new();
        deliver(&mut channel, &mut replica);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        replica.subscribe(FieldId::Health, move |change| {
            sink.lock().unwrap().push(change.new);
        });

        kill(&mut channel, entity, CombatIdentity(20));
        let report = deliver(&mut channel, &mut replica);

        let state = replica.state(entity).unwrap();
        assert_eq!(state.health, 0.0);
        assert!(!state.alive());
        assert_eq!(state.validate(), Ok(()));
        assert_eq!(
            report.events,
            vec![
                CombatEvent::HealthChanged {
                    entity,
                    old: 100.0,
                    new: 0.0
                },
                CombatEvent::Died {
                    entity,
                    killer: Killer::Player(CombatIdentity(20))
                },
            ]
        );
        assert_eq!(*seen.lock().unwrap(), vec![FieldValue::Health(0.0)]);
    }

    #[test]
    fn test_duplicate_delivery_is_idempotent() {
        let (mut channel, entity) = authority();
        let mut replica = ObserverReplica::new();
        deliver(&mut channel, &mut replica);

        kill(&mut channel, entity, CombatIdentity(20));
        let broadcasts = channel.drain_outbox();
        let first = replica.apply(&broadcasts[0]);
        let second = replica.apply(&broadcasts[0]);

        assert_eq!(first.events.len(), 2);
        assert!(second.events.is_empty());
        assert!(!second.needs_resync);
        assert!(!replica.state(entity).unwrap().alive());
    }

    #[test]
    fn test_gap_requests_resync() {
        let (mut channel, entity) = authority();
        let mut replica = ObserverReplica::new();
        deliver(&mut channel, &mut replica);

        channel.publish(entity, &[FieldValue::Health(80.0)]).unwrap();
        channel.publish(entity, &[FieldValue::Health(60.0)]).unwrap();
        let broadcasts = channel.drain_outbox();

        let report = replica.apply(&broadcasts[1]);
        assert!(report.needs_resync);
        assert_eq!(replica.state(entity).unwrap().health, 60.0);

        // The older change arriving late is ignored.
        let late = replica.apply(&broadcasts[0]);
        assert!(late.events.is_empty());
        assert_eq!(replica.state(entity).unwrap().health, 60.0);
    }

    #[test]
    fn test_change_for_unknown_entity_requests_resync() {
        let (mut channel, entity) = authority();
        channel.drain_outbox();
        channel.publish(entity, &[FieldValue::Health(80.0)]).unwrap();

        let mut replica = ObserverReplica::new();
        let report = deliver(&mut channel, &mut replica);
        assert!(report.needs_resync);
        assert!(replica.is_empty());
    }

    #[test]
    fn test_snapshot_catches_up_and_raises_events() {
        let (mut channel, entity) = authority();
        let mut replica = ObserverReplica::new();
        deliver(&mut channel, &mut replica);

        // The observer misses the kill broadcast entirely.
        kill(&mut channel, entity, CombatIdentity(20));
        channel.drain_outbox();

        let report = replica.apply_snapshot(&channel.snapshot());
        assert!(!replica.state(entity).unwrap().alive());
        assert!(report.events.contains(&CombatEvent::Died {
            entity,
            killer: Killer::Player(CombatIdentity(20))
        }));

        // Re-applying the same snapshot changes nothing.
        let again = replica.apply_snapshot(&channel.snapshot());
        assert!(again.events.is_empty());
    }

    #[test]
    fn test_snapshot_after_missed_revive_raises_new_death() {
        let (mut channel, entity) = authority();
        let mut replica = ObserverReplica::new();
        deliver(&mut channel, &mut replica);
        kill(&mut channel, entity, CombatIdentity(20));
        deliver(&mut channel, &mut replica);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        replica.subscribe(FieldId::Health, move |change| {
            sink.lock().unwrap().push(change.new);
        });

        // Revive and a second kill both go missing.
        channel
            .publish(
                entity,
                &[
                    FieldValue::Health(100.0),
                    FieldValue::Life(LifeState::Alive),
                ],
            )
            .unwrap();
        kill(&mut channel, entity, CombatIdentity(30));
        channel.drain_outbox();

        let report = replica.apply_snapshot(&channel.snapshot());
        assert_eq!(
            report.events,
            vec![
                CombatEvent::Revived { entity },
                CombatEvent::Died {
                    entity,
                    killer: Killer::Player(CombatIdentity(30))
                },
            ]
        );
        // Health moved 0 -> 100 -> 0; only its sequence differs.
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(
            replica.entity(entity).unwrap().seq(FieldId::Health),
            channel.snapshot().entity(entity).unwrap().health.seq
        );
    }

    #[test]
    fn test_snapshot_despawns_missing_entities() {
        let (mut channel, entity) = authority();
        let mut replica = ObserverReplica::new();
        deliver(&mut channel, &mut replica);

        channel.despawn(entity);
        channel.drain_outbox();

        let report = replica.apply_snapshot(&channel.snapshot());
        assert_eq!(report.events, vec![CombatEvent::Despawned { entity }]);
        assert!(replica.is_empty());
    }

    #[test]
    fn test_late_joiner_sees_dead_player() {
        let (mut channel, entity) = authority();
        kill(&mut channel, entity, CombatIdentity(20));
        channel.drain_outbox();

        let mut replica = ObserverReplica::new();
        let report = replica.apply_snapshot(&channel.snapshot());
        assert_eq!(report.events.len(), 2);
        assert!(matches!(report.events[1], CombatEvent::Died { .. }));

        // Broadcasts already covered by the snapshot are stale.
        channel
            .publish(entity, &[FieldValue::LastDamageSource(None)])
            .unwrap();
        let live = deliver(&mut channel, &mut replica);
        assert!(!live.needs_resync);
        assert_eq!(replica.state(entity).unwrap().last_damage_source, None);
    }
}
