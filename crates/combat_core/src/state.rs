//! The per-player combat record and its invariants.

use serde::{Deserialize, Serialize};

use crate::identity::{CombatIdentity, Killer};

/// Replicated alive/dead flag, carrying the kill attribution while dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeState {
    /// Health is above zero.
    Alive,
    /// Health reached zero. `killer` is fixed at the moment of death.
    Dead {
        /// Who gets the kill.
        killer: Killer,
    },
}

impl LifeState {
    /// Returns `true` for [`LifeState::Alive`].
    #[must_use]
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Alive)
    }

    /// Returns the killer while dead.
    #[must_use]
    pub const fn killer(self) -> Option<Killer> {
        match self {
            Self::Alive => None,
            Self::Dead { killer } => Some(killer),
        }
    }
}

/// A plain-value view of one player's combat state.
///
/// Both the authority and observers hand these out by value; neither side
/// can write back through it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatState {
    /// Current hit points, `0 ..= max_health`.
    pub health: f32,
    /// Hit points on spawn and revive. Constant per match.
    pub max_health: f32,
    /// Alive/dead, always `health > 0`.
    pub life: LifeState,
    /// Source of the most recent hit, cleared on revive.
    pub last_damage_source: Option<CombatIdentity>,
}

impl CombatState {
    /// A freshly spawned player at full health.
    #[must_use]
    pub const fn full(max_health: f32) -> Self {
        Self {
            health: max_health,
            max_health,
            life: LifeState::Alive,
            last_damage_source: None,
        }
    }

    /// Returns `true` while alive.
    #[must_use]
    pub const fn alive(&self) -> bool {
        self.life.is_alive()
    }

    /// Returns `true` if health is at the maximum.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.health >= self.max_health
    }

    /// Check every combat-state invariant.
    ///
    /// # Errors
    ///
    /// Returns the first [`StateError`] found.
    pub fn validate(&self) -> Result<(), StateError> {
        if !self.max_health.is_finite() || self.max_health <= 0.0 {
            return Err(StateError::InvalidMaxHealth(self.max_health));
        }
        if !self.health.is_finite() || self.health < 0.0 || self.health > self.max_health {
            return Err(StateError::HealthOutOfRange {
                health: self.health,
                max_health: self.max_health,
            });
        }
        if self.alive() != (self.health > 0.0) {
            return Err(StateError::LifeMismatch {
                health: self.health,
                alive: self.alive(),
            });
        }
        Ok(())
    }
}

/// A combat-state invariant violation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    /// Max health must be finite and positive.
    #[error("max health must be finite and positive, got {0}")]
    InvalidMaxHealth(f32),

    /// Health left `0 ..= max_health`.
    #[error("health {health} outside 0..={max_health}")]
    HealthOutOfRange {
        /// The offending health value.
        health: f32,
        /// The entity's max health.
        max_health: f32,
    },

    /// `alive` disagrees with `health > 0`.
    #[error("alive={alive} disagrees with health {health}")]
    LifeMismatch {
        /// Health at the time of the check.
        health: f32,
        /// The alive flag at the time of the check.
        alive: bool,
    },
}
