//! Mutation requests sent from observers to the authority.

use serde::{Deserialize, Serialize};

use crate::entity::PlayerEntity;
use crate::identity::CombatIdentity;

/// A combat mutation a non-authority process asks the authority to perform.
///
/// Requests are fire-and-forget: the sender learns the result only from the
/// broadcast that follows, if any.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CombatRequest {
    /// A locally detected hit.
    Hit {
        /// The entity that was hit.
        target: PlayerEntity,
        /// Damage to apply. Validated by the authority.
        amount: f32,
        /// Identity of the shooter.
        source: CombatIdentity,
    },
    /// Restore health.
    Heal {
        /// The entity to heal.
        target: PlayerEntity,
        /// Health to restore. Validated by the authority.
        amount: f32,
    },
    /// The sender's death countdown for `target` elapsed.
    Revive {
        /// The dead entity.
        target: PlayerEntity,
    },
}

impl CombatRequest {
    /// The entity the request targets.
    #[must_use]
    pub const fn target(&self) -> PlayerEntity {
        match *self {
            Self::Hit { target, .. } | Self::Heal { target, .. } | Self::Revive { target } => {
                target
            }
        }
    }
}
