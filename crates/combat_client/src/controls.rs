//! Control surface — the seam to the game's movement and weapon input.

use combat_core::PlayerEntity;
use tracing::info;

/// Enables and disables player input for an entity.
///
/// Calls are only ever made in response to replicated life-state changes.
pub trait ControlSurface {
    /// Enable or disable movement and look input.
    fn set_controls_enabled(&mut self, entity: PlayerEntity, enabled: bool);

    /// Enable or disable firing.
    fn set_weapons_enabled(&mut self, entity: PlayerEntity, enabled: bool);
}

/// A control surface for headless processes: logs each change.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingControls;

impl ControlSurface for LoggingControls {
    fn set_controls_enabled(&mut self, entity: PlayerEntity, enabled: bool) {
        info!(%entity, enabled, "controls");
    }

    fn set_weapons_enabled(&mut self, entity: PlayerEntity, enabled: bool) {
        info!(%entity, enabled, "weapons");
    }
}
