//! Authority configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest accepted timer. Deadlines are added to the match clock, which
/// must not overflow.
const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Match rules enforced by the authority.
///
/// Durations are stored as seconds so the JSON config stays readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Health on spawn and revive.
    pub max_health: f32,
    /// Time without damage before regeneration starts.
    pub regen_grace_secs: f32,
    /// Time between regeneration heals.
    pub regen_interval_secs: f32,
    /// Health restored per regeneration heal.
    pub regen_amount: f32,
    /// Time a dead player waits before being eligible for revival.
    pub respawn_delay_secs: f32,
    /// Revive dead players on the authority tick once eligible, without
    /// waiting for an observer's request.
    pub auto_revive: bool,
    /// Maximum simultaneously spawned players.
    pub max_players: usize,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            regen_grace_secs: 5.0,
            regen_interval_secs: 1.0,
            regen_amount: 15.0,
            respawn_delay_secs: 5.0,
            auto_revive: true,
            max_players: 16,
        }
    }
}

impl AuthorityConfig {
    /// Parse and validate a JSON config. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if parsing or validation fails.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_health", self.max_health),
            ("regen_interval_secs", self.regen_interval_secs),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        let non_negative = [
            ("regen_grace_secs", self.regen_grace_secs),
            ("regen_amount", self.regen_amount),
            ("respawn_delay_secs", self.respawn_delay_secs),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        let durations = [
            ("regen_grace_secs", self.regen_grace_secs),
            ("regen_interval_secs", self.regen_interval_secs),
            ("respawn_delay_secs", self.respawn_delay_secs),
        ];
        for (name, value) in durations {
            let usable = Duration::try_from_secs_f32(value).is_ok_and(|d| d <= MAX_DURATION);
            if !usable {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be at most {} seconds, got {value}",
                    MAX_DURATION.as_secs()
                )));
            }
        }
        if self.max_players == 0 {
            return Err(ConfigError::Invalid("max_players must be at least 1".into()));
        }
        Ok(())
    }

    /// Grace period before regeneration.
    #[must_use]
    pub fn regen_grace(&self) -> Duration {
        seconds(self.regen_grace_secs)
    }

    /// Interval between regeneration heals.
    #[must_use]
    pub fn regen_interval(&self) -> Duration {
        seconds(self.regen_interval_secs)
    }

    /// Delay between death and revival eligibility.
    #[must_use]
    pub fn respawn_delay(&self) -> Duration {
        seconds(self.respawn_delay_secs)
    }
}

/// Seconds to a duration, clamped to what [`AuthorityConfig::validate`]
/// accepts. NaN maps to zero.
fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.clamp(0.0, MAX_DURATION.as_secs_f32()))
        .unwrap_or(Duration::ZERO)
}
