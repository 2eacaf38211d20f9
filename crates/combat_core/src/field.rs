//! Replicated fields and the change records that carry them.
//!
//! Every replicated value is stored with a per-(entity, field) sequence
//! number. The authority bumps it on each write; observers accept a change
//! only when its sequence is newer than what they hold. This gives in-order
//! apply per field and turns duplicate delivery into a no-op.

use serde::{Deserialize, Serialize};

use crate::identity::CombatIdentity;
use crate::state::{CombatState, LifeState};

/// Which replicated field of a combat state a change touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldId {
    /// Current hit points.
    Health,
    /// Alive/dead and kill attribution.
    Life,
    /// Source of the most recent hit.
    LastDamageSource,
}

impl FieldId {
    /// Every replicated field.
    pub const ALL: [FieldId; 3] = [FieldId::Health, FieldId::Life, FieldId::LastDamageSource];
}

/// A new value for one replicated field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// New health.
    Health(f32),
    /// New alive/dead state.
    Life(LifeState),
    /// New last damage source.
    LastDamageSource(Option<CombatIdentity>),
}

impl FieldValue {
    /// The field this value belongs to.
    #[must_use]
    pub const fn field(&self) -> FieldId {
        match self {
            Self::Health(_) => FieldId::Health,
            Self::Life(_) => FieldId::Life,
            Self::LastDamageSource(_) => FieldId::LastDamageSource,
        }
    }
}

/// A value tagged with the sequence number of the write that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Per-(entity, field) write counter. Zero is the spawn value.
    pub seq: u64,
    /// The value.
    pub value: T,
}

/// One published field write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Sequence number assigned by the authority.
    pub seq: u64,
    /// The new value.
    pub value: FieldValue,
}

/// Field writes to one entity that observers must apply together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// The entity written to.
    pub entity: crate::PlayerEntity,
    /// The writes, in publish order.
    pub changes: Vec<FieldChange>,
}

/// Result of offering a change to an observed field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Accept<T> {
    /// Already applied this sequence or a newer one.
    Stale,
    /// The value was replaced.
    Applied {
        /// Value held before the change.
        old: T,
        /// One or more earlier writes were never seen.
        gap: bool,
    },
}

/// A single replicated value.
///
/// Public accessors are read-only. Writing is crate-internal: the authority
/// writes through [`AuthorityChannel`](crate::AuthorityChannel) and
/// observers overwrite through [`ObserverReplica`](crate::ObserverReplica).
#[derive(Debug, Clone)]
pub struct ReplicatedField<T> {
    current: Versioned<T>,
}

impl<T: Clone + PartialEq> ReplicatedField<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            current: Versioned { seq: 0, value },
        }
    }

    pub(crate) fn from_versioned(current: Versioned<T>) -> Self {
        Self { current }
    }

    /// The current value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.current.value
    }

    /// Sequence number of the current value.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.current.seq
    }

    /// The current value with its sequence number.
    #[must_use]
    pub fn versioned(&self) -> Versioned<T> {
        self.current.clone()
    }

    /// Authority write. Returns the new sequence, or `None` if the value is unchanged.
    pub(crate) fn write(&mut self, value: T) -> Option<u64> {
        if self.current.value == value {
            return None;
        }
        self.current = Versioned {
            seq: self.current.seq + 1,
            value,
        };
        Some(self.current.seq)
    }

    /// Observer overwrite from a broadcast.
    pub(crate) fn accept(&mut self, seq: u64, value: T) -> Accept<T> {
        if seq <= self.current.seq {
            return Accept::Stale;
        }
        let gap = seq > self.current.seq + 1;
        let old = std::mem::replace(&mut self.current, Versioned { seq, value }).value;
        Accept::Applied { old, gap }
    }
}

/// The replicated fields of one player, shared by the authority and observer
/// sides.
#[derive(Debug, Clone)]
pub(crate) struct VitalFields {
    pub(crate) max_health: f32,
    pub(crate) health: ReplicatedField<f32>,
    pub(crate) life: ReplicatedField<LifeState>,
    pub(crate) last_damage_source: ReplicatedField<Option<CombatIdentity>>,
}

impl VitalFields {
    pub(crate) fn full(max_health: f32) -> Self {
        Self {
            max_health,
            health: ReplicatedField::new(max_health),
            life: ReplicatedField::new(LifeState::Alive),
            last_damage_source: ReplicatedField::new(None),
        }
    }

    pub(crate) fn state(&self) -> CombatState {
        CombatState {
            health: *self.health.value(),
            max_health: self.max_health,
            life: *self.life.value(),
            last_damage_source: *self.last_damage_source.value(),
        }
    }

    /// The state that would result from applying `values` on top of this one.
    pub(crate) fn candidate(&self, values: &[FieldValue]) -> CombatState {
        let mut state = self.state();
        for value in values {
            match *value {
                FieldValue::Health(h) => state.health = h,
                FieldValue::Life(l) => state.life = l,
                FieldValue::LastDamageSource(s) => state.last_damage_source = s,
            }
        }
        state
    }

    pub(crate) fn write(&mut self, value: FieldValue) -> Option<FieldChange> {
        let seq = match value {
            FieldValue::Health(h) => self.health.write(h),
            FieldValue::Life(l) => self.life.write(l),
            FieldValue::LastDamageSource(s) => self.last_damage_source.write(s),
        }?;
        Some(FieldChange { seq, value })
    }

    pub(crate) fn accept(&mut self, change: &FieldChange) -> Accept<FieldValue> {
        match change.value {
            FieldValue::Health(h) => map_accept(self.health.accept(change.seq, h), FieldValue::Health),
            FieldValue::Life(l) => map_accept(self.life.accept(change.seq, l), FieldValue::Life),
            FieldValue::LastDamageSource(s) => map_accept(
                self.last_damage_source.accept(change.seq, s),
                FieldValue::LastDamageSource,
            ),
        }
    }
}

fn map_accept<T>(accept: Accept<T>, wrap: fn(T) -> FieldValue) -> Accept<FieldValue> {
    match accept {
        Accept::Stale => Accept::Stale,
        Accept::Applied { old, gap } => Accept::Applied { old: wrap(old), gap },
    }
}
