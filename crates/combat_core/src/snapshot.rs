//! Full-state snapshots for late-join sync.

use serde::{Deserialize, Serialize};

use crate::entity::PlayerEntity;
use crate::field::{ReplicatedField, Versioned, VitalFields};
use crate::identity::{CombatIdentity, PlayerProfile};
use crate::state::{CombatState, LifeState};

/// Everything an observer needs to start mirroring one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// The player entity.
    pub entity: PlayerEntity,
    /// Identity the entity was spawned for.
    pub identity: CombatIdentity,
    /// Display data for the identity.
    pub profile: PlayerProfile,
    /// Max health for this match.
    pub max_health: f32,
    /// Current health with its sequence number.
    pub health: Versioned<f32>,
    /// Current alive/dead state with its sequence number.
    pub life: Versioned<LifeState>,
    /// Current last damage source with its sequence number.
    pub last_damage_source: Versioned<Option<CombatIdentity>>,
}

impl EntitySnapshot {
    pub(crate) fn capture(
        entity: PlayerEntity,
        identity: CombatIdentity,
        profile: PlayerProfile,
        fields: &VitalFields,
    ) -> Self {
        Self {
            entity,
            identity,
            profile,
            max_health: fields.max_health,
            health: fields.health.versioned(),
            life: fields.life.versioned(),
            last_damage_source: fields.last_damage_source.versioned(),
        }
    }

    pub(crate) fn to_fields(&self) -> VitalFields {
        VitalFields {
            max_health: self.max_health,
            health: ReplicatedField::from_versioned(self.health),
            life: ReplicatedField::from_versioned(self.life),
            last_damage_source: ReplicatedField::from_versioned(self.last_damage_source),
        }
    }

    /// The combat state captured in this snapshot.
    #[must_use]
    pub fn state(&self) -> CombatState {
        CombatState {
            health: self.health.value,
            max_health: self.max_health,
            life: self.life.value,
            last_damage_source: self.last_damage_source.value,
        }
    }
}

/// The authority's complete combat state at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Every spawned player, ordered by entity.
    pub entities: Vec<EntitySnapshot>,
}

impl Snapshot {
    /// Look up one entity's snapshot.
    #[must_use]
    pub fn entity(&self, entity: PlayerEntity) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.entity == entity)
    }
}
