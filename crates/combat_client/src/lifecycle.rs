//! Death lifecycle — the death-screen countdown for one entity.
//!
//! `Active -> Incapacitated -> Active`. Entering and leaving the
//! incapacitated phase is driven only by replicated life state; the local
//! countdown can do nothing but ask the authority for a revive.

use std::time::Duration;

use combat_core::Killer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Incapacitated {
        killer: Killer,
        deadline: Duration,
        revive_requested: bool,
    },
}

/// Per-entity death countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathLifecycle {
    phase: Phase,
}

impl Default for DeathLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl DeathLifecycle {
    /// A living entity.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Active,
        }
    }

    /// Replicated death observed. Repeated calls keep the first deadline.
    ///
    /// Returns `true` if this was a transition.
    pub fn on_death(&mut self, killer: Killer, deadline: Duration) -> bool {
        if self.is_incapacitated() {
            return false;
        }
        self.phase = Phase::Incapacitated {
            killer,
            deadline,
            revive_requested: false,
        };
        true
    }

    /// Replicated revive observed.
    ///
    /// Returns `true` if this was a transition.
    pub fn on_revive(&mut self) -> bool {
        let was = self.is_incapacitated();
        self.phase = Phase::Active;
        was
    }

    /// Advance to `now`. Returns `true` exactly once, when the countdown
    /// first elapses and a revive should be requested.
    pub fn tick(&mut self, now: Duration) -> bool {
        match &mut self.phase {
            Phase::Incapacitated {
                deadline,
                revive_requested,
                ..
            } if !*revive_requested && now >= *deadline => {
                *revive_requested = true;
                true
            }
            _ => false,
        }
    }

    /// Returns `true` between replicated death and replicated revive.
    #[must_use]
    pub const fn is_incapacitated(&self) -> bool {
        matches!(self.phase, Phase::Incapacitated { .. })
    }

    /// Time left on the countdown, `None` while active.
    #[must_use]
    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        match self.phase {
            Phase::Active => None,
            Phase::Incapacitated { deadline, .. } => Some(deadline.saturating_sub(now)),
        }
    }

    /// Who got the kill, `None` while active.
    #[must_use]
    pub const fn killer(&self) -> Option<Killer> {
        match self.phase {
            Phase::Active => None,
            Phase::Incapacitated { killer, .. } => Some(killer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_core::CombatIdentity;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_countdown_requests_once() {
        let mut lifecycle = DeathLifecycle::new();
        let killer = Killer::Player(CombatIdentity(3));
        assert!(lifecycle.on_death(killer, secs(15)));
        assert_eq!(lifecycle.killer(), Some(killer));
        assert_eq!(lifecycle.remaining(secs(12)), Some(secs(3)));

        assert!(!lifecycle.tick(secs(14)));
        assert!(lifecycle.tick(secs(15)));
        assert!(!lifecycle.tick(secs(16)));
        // Still incapacitated until the revive is replicated.
        assert!(lifecycle.is_incapacitated());
        assert_eq!(lifecycle.remaining(secs(20)), Some(Duration::ZERO));
    }

    #[test]
    fn test_repeated_death_keeps_deadline() {
        let mut lifecycle = DeathLifecycle::new();
        lifecycle.on_death(Killer::Environment, secs(5));
        assert!(!lifecycle.on_death(Killer::Environment, secs(9)));
        assert_eq!(lifecycle.remaining(Duration::ZERO), Some(secs(5)));
    }

    #[test]
    fn test_revive_returns_to_active() {
        let mut lifecycle = DeathLifecycle::new();
        assert!(!lifecycle.on_revive());
        lifecycle.on_death(Killer::Environment, secs(5));
        assert!(lifecycle.on_revive());
        assert!(!lifecycle.is_incapacitated());
        assert_eq!(lifecycle.killer(), None);
        assert!(!lifecycle.tick(secs(10)));
    }
}
