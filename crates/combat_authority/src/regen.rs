//! Authority-local regeneration schedule.
//!
//! Nothing here is replicated. The authority turns due ticks into ordinary
//! heals, and observers only ever see those heals.

use std::time::Duration;

use crate::config::AuthorityConfig;

/// Regeneration timing, taken from [`AuthorityConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegenPolicy {
    /// Time without damage before the first heal is scheduled.
    pub grace: Duration,
    /// Time between heals.
    pub interval: Duration,
    /// Health per heal.
    pub amount: f32,
}

impl From<&AuthorityConfig> for RegenPolicy {
    fn from(config: &AuthorityConfig) -> Self {
        Self {
            grace: config.regen_grace(),
            interval: config.regen_interval(),
            amount: config.regen_amount,
        }
    }
}

/// Per-player regeneration deadlines.
///
/// The first heal lands `grace + interval` after the last damage, then one
/// every `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegenState {
    last_damage_at: Duration,
    next_heal_at: Option<Duration>,
}

impl RegenState {
    /// A fresh schedule, counting from `now`.
    #[must_use]
    pub const fn new(now: Duration) -> Self {
        Self {
            last_damage_at: now,
            next_heal_at: None,
        }
    }

    /// Damage was applied at `now`; restart the grace period.
    pub fn on_damage(&mut self, now: Duration) {
        self.last_damage_at = now;
        self.next_heal_at = None;
    }

    /// Stop the schedule (health is full).
    pub fn idle(&mut self) {
        self.next_heal_at = None;
    }

    /// Returns `true` once the grace period has passed and heals are scheduled.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.next_heal_at.is_some()
    }

    /// Time since the last damage.
    #[must_use]
    pub fn since_last_damage(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_damage_at)
    }

    /// Number of heals due at `now`, advancing the schedule past them.
    pub fn due(&mut self, now: Duration, policy: &RegenPolicy) -> u32 {
        if policy.interval.is_zero() || self.since_last_damage(now) < policy.grace {
            return 0;
        }
        let next = self
            .next_heal_at
            .get_or_insert(self.last_damage_at + policy.grace + policy.interval);
        let mut due = 0;
        while now >= *next {
            due += 1;
            *next += policy.interval;
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RegenPolicy {
        RegenPolicy {
            grace: Duration::from_secs(5),
            interval: Duration::from_secs(1),
            amount: 15.0,
        }
    }

    #[test]
    fn test_nothing_due_during_grace() {
        let mut regen = RegenState::new(Duration::ZERO);
        assert_eq!(regen.due(Duration::from_secs(3), &policy()), 0);
        assert!(!regen.is_active());
    }

    #[test]
    fn test_first_heal_one_interval_after_grace() {
        let mut regen = RegenState::new(Duration::ZERO);
        assert_eq!(regen.due(Duration::from_secs(5), &policy()), 0);
        assert!(regen.is_active());
        assert_eq!(regen.due(Duration::from_millis(5_999), &policy()), 0);
        assert_eq!(regen.due(Duration::from_secs(6), &policy()), 1);
        assert_eq!(regen.due(Duration::from_secs(6), &policy()), 0);
        assert_eq!(regen.due(Duration::from_secs(7), &policy()), 1);
    }

    #[test]
    fn test_coarse_tick_catches_up() {
        let mut regen = RegenState::new(Duration::ZERO);
        assert_eq!(regen.due(Duration::from_secs(9), &policy()), 4);
    }

    #[test]
    fn test_damage_restarts_grace() {
        let mut regen = RegenState::new(Duration::ZERO);
        assert_eq!(regen.due(Duration::from_secs(6), &policy()), 1);
        regen.on_damage(Duration::from_secs(6));
        assert!(!regen.is_active());
        assert_eq!(regen.due(Duration::from_secs(10), &policy()), 0);
        assert_eq!(regen.due(Duration::from_secs(12), &policy()), 1);
        assert_eq!(regen.since_last_damage(Duration::from_secs(12)), Duration::from_secs(6));
    }
}
