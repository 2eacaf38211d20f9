//! Authority error types.

use combat_core::{ChannelError, PlayerEntity};

/// A request rejected at the authority boundary.
///
/// Rejections never change state or produce a broadcast. Expected no-ops
/// (a hit on a dead player, a heal at full health) are not errors; they come
/// back as [`Outcome::Ignored`](crate::Outcome::Ignored).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// Damage or heal amount was negative, NaN, or infinite.
    #[error("invalid amount {0}")]
    InvalidAmount(f32),

    /// The target is not spawned (never was, or already despawned).
    #[error("unknown target {0}")]
    UnknownTarget(PlayerEntity),

    /// The match has no free player slot.
    #[error("lobby full ({max_players} players)")]
    LobbyFull {
        /// Configured player limit.
        max_players: usize,
    },

    /// The replicated write itself was refused.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Errors loading or validating an [`AuthorityConfig`](crate::AuthorityConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file is not valid JSON for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
