//! The damage authority.
//!
//! [`DamageAuthority`] owns the [`AuthorityChannel`] and is the only place
//! health transitions are decided. Every operation either publishes one
//! atomic change set or leaves state untouched.

use std::collections::BTreeMap;
use std::time::Duration;

use combat_core::{
    AuthorityChannel, Broadcast, CombatIdentity, CombatRequest, CombatState, EntityAllocator,
    FieldValue, Killer, LifeState, PlayerEntity, PlayerProfile, Snapshot,
};
use tracing::{debug, info, warn};

use crate::config::AuthorityConfig;
use crate::error::{ConfigError, RequestError};
use crate::regen::{RegenPolicy, RegenState};
use crate::roster::Roster;

/// Authority-side life phase. The revive deadline never leaves the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Health above zero.
    Alive,
    /// Waiting for revival; eligible from `revive_at`.
    Dead {
        /// Tick-clock time from which revival is allowed.
        revive_at: Duration,
    },
}

/// Why a well-formed request changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Hits and heals on a dead target are absorbed.
    TargetDead,
    /// Heal on a target already at max health.
    AtMaxHealth,
    /// Revive on a living target.
    NotDead,
    /// Revive requested before the respawn delay elapsed.
    NotYetEligible,
}

/// Result of an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed and a broadcast was queued.
    Applied,
    /// The hit was lethal.
    Killed {
        /// Attribution recorded with the death.
        killer: Killer,
    },
    /// Nothing changed.
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy)]
struct PlayerRecord {
    identity: CombatIdentity,
    phase: Phase,
    regen: RegenState,
}

/// The single writer of combat state for a match.
#[derive(Debug)]
pub struct DamageAuthority {
    config: AuthorityConfig,
    policy: RegenPolicy,
    channel: AuthorityChannel,
    allocator: EntityAllocator,
    roster: Roster,
    players: BTreeMap<PlayerEntity, PlayerRecord>,
}

impl DamageAuthority {
    /// Create an authority with no players.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the config fails validation.
    pub fn new(config: AuthorityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            policy: RegenPolicy::from(&config),
            config,
            channel: AuthorityChannel::new(),
            allocator: EntityAllocator::new(),
            roster: Roster::new(),
            players: BTreeMap::new(),
        })
    }

    /// The active match rules.
    #[must_use]
    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// Identities claimed so far.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    // ── Session ──────────────────────────────────────────────────────────────

    /// Admit a player and spawn their entity at full health.
    ///
    /// An account that already has a spawned entity gets that entity back
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::LobbyFull`] when no slot is free.
    pub fn join(
        &mut self,
        account_id: u64,
        display_name: &str,
        now: Duration,
    ) -> Result<(CombatIdentity, PlayerEntity), RequestError> {
        if let Some(identity) = self.roster.identity_for(account_id)
            && let Some(entity) = self.entity_for(identity)
        {
            self.roster.claim(account_id, display_name);
            debug!(%entity, %identity, "rejoin of spawned player");
            return Ok((identity, entity));
        }

        let max_players = self.config.max_players;
        if self.players.len() >= max_players {
            warn!(account_id, max_players, "join rejected, lobby full");
            return Err(RequestError::LobbyFull { max_players });
        }

        let identity = self.roster.claim(account_id, display_name);
        let profile = PlayerProfile::new(account_id, display_name);
        let entity = self.allocator.allocate();
        self.channel
            .spawn(entity, identity, profile, self.config.max_health)?;
        self.players.insert(
            entity,
            PlayerRecord {
                identity,
                phase: Phase::Alive,
                regen: RegenState::new(now),
            },
        );
        info!(%entity, %identity, name = display_name, "player joined");
        Ok((identity, entity))
    }

    /// Despawn a player. Their identity stays claimed.
    ///
    /// Returns `true` if the entity was spawned.
    pub fn leave(&mut self, entity: PlayerEntity) -> bool {
        let Some(record) = self.players.remove(&entity) else {
            return false;
        };
        self.channel.despawn(entity);
        info!(%entity, identity = %record.identity, "player left");
        true
    }

    /// The spawned entity of an identity, if any.
    #[must_use]
    pub fn entity_for(&self, identity: CombatIdentity) -> Option<PlayerEntity> {
        self.players
            .iter()
            .find(|(_, r)| r.identity == identity)
            .map(|(&entity, _)| entity)
    }

    // ── Requests ─────────────────────────────────────────────────────────────

    /// Apply a forwarded request.
    ///
    /// A forwarded `Revive` goes through [`request_revive`](Self::request_revive),
    /// so observers cannot revive a player early.
    ///
    /// # Errors
    ///
    /// See [`RequestError`]. Rejections are logged at `warn`.
    pub fn handle(
        &mut self,
        request: CombatRequest,
        now: Duration,
    ) -> Result<Outcome, RequestError> {
        let result = match request {
            CombatRequest::Hit {
                target,
                amount,
                source,
            } => self.report_hit(target, amount, source, now),
            CombatRequest::Heal { target, amount } => self.heal(target, amount),
            CombatRequest::Revive { target } => self.request_revive(target, now),
        };
        if let Err(err) = &result {
            warn!(entity = %request.target(), error = %err, "request rejected");
        }
        result
    }

    /// Apply damage from `source` to `target`.
    ///
    /// A lethal hit publishes health, source and death together.
    ///
    /// # Errors
    ///
    /// [`RequestError::InvalidAmount`] or [`RequestError::UnknownTarget`].
    pub fn report_hit(
        &mut self,
        target: PlayerEntity,
        amount: f32,
        source: CombatIdentity,
        now: Duration,
    ) -> Result<Outcome, RequestError> {
        let amount = validate_amount(amount)?;
        let state = self.alive_state(target)?;
        let Some(state) = state else {
            debug!(entity = %target, %source, "hit on dead target ignored");
            return Ok(Outcome::Ignored(IgnoreReason::TargetDead));
        };

        let health = (state.health - amount).max(0.0);
        let last_source = source.is_set().then_some(source);

        let outcome = if health > 0.0 {
            self.channel.publish(
                target,
                &[
                    FieldValue::LastDamageSource(last_source),
                    FieldValue::Health(health),
                ],
            )?;
            debug!(entity = %target, %source, amount, health, "hit applied");
            Outcome::Applied
        } else {
            let killer = Killer::from_source(source);
            self.channel.publish(
                target,
                &[
                    FieldValue::LastDamageSource(last_source),
                    FieldValue::Health(0.0),
                    FieldValue::Life(LifeState::Dead { killer }),
                ],
            )?;
            let revive_at = now + self.config.respawn_delay();
            if let Some(record) = self.players.get_mut(&target) {
                record.phase = Phase::Dead { revive_at };
            }
            info!(entity = %target, ?killer, "player killed");
            Outcome::Killed { killer }
        };

        if let Some(record) = self.players.get_mut(&target) {
            record.regen.on_damage(now);
        }
        Ok(outcome)
    }

    /// Restore health, capped at the maximum.
    ///
    /// # Errors
    ///
    /// [`RequestError::InvalidAmount`] or [`RequestError::UnknownTarget`].
    pub fn heal(&mut self, target: PlayerEntity, amount: f32) -> Result<Outcome, RequestError> {
        let amount = validate_amount(amount)?;
        let Some(state) = self.alive_state(target)? else {
            debug!(entity = %target, "heal on dead target ignored");
            return Ok(Outcome::Ignored(IgnoreReason::TargetDead));
        };
        if state.is_full() {
            return Ok(Outcome::Ignored(IgnoreReason::AtMaxHealth));
        }

        let health = (state.health + amount).min(state.max_health);
        self.channel.publish(target, &[FieldValue::Health(health)])?;
        debug!(entity = %target, amount, health, "heal applied");
        Ok(Outcome::Applied)
    }

    /// Revive a dead player at full health, clearing the damage source.
    ///
    /// Unconditional apart from the target being dead; use
    /// [`request_revive`](Self::request_revive) for requests that must wait
    /// out the respawn delay.
    ///
    /// # Errors
    ///
    /// [`RequestError::UnknownTarget`].
    pub fn revive(&mut self, target: PlayerEntity, now: Duration) -> Result<Outcome, RequestError> {
        let record = self
            .players
            .get(&target)
            .ok_or(RequestError::UnknownTarget(target))?;
        if record.phase == Phase::Alive {
            debug!(entity = %target, "revive on living target ignored");
            return Ok(Outcome::Ignored(IgnoreReason::NotDead));
        }

        self.channel.publish(
            target,
            &[
                FieldValue::Life(LifeState::Alive),
                FieldValue::Health(self.config.max_health),
                FieldValue::LastDamageSource(None),
            ],
        )?;
        if let Some(record) = self.players.get_mut(&target) {
            record.phase = Phase::Alive;
            record.regen = RegenState::new(now);
        }
        info!(entity = %target, "player revived");
        Ok(Outcome::Applied)
    }

    /// Revive only if the target is dead and past its revive deadline.
    ///
    /// # Errors
    ///
    /// [`RequestError::UnknownTarget`].
    pub fn request_revive(
        &mut self,
        target: PlayerEntity,
        now: Duration,
    ) -> Result<Outcome, RequestError> {
        let phase = self
            .phase(target)
            .ok_or(RequestError::UnknownTarget(target))?;
        match phase {
            Phase::Alive => {
                debug!(entity = %target, "revive request for living target ignored");
                Ok(Outcome::Ignored(IgnoreReason::NotDead))
            }
            Phase::Dead { revive_at } if now < revive_at => {
                debug!(entity = %target, remaining = ?(revive_at - now), "revive requested early");
                Ok(Outcome::Ignored(IgnoreReason::NotYetEligible))
            }
            Phase::Dead { .. } => self.revive(target, now),
        }
    }

    // ── Tick ─────────────────────────────────────────────────────────────────

    /// Advance authority timers to `now`: auto-revive, then regeneration.
    pub fn tick(&mut self, now: Duration) {
        if self.config.auto_revive {
            let due: Vec<_> = self
                .players
                .iter()
                .filter_map(|(&entity, r)| match r.phase {
                    Phase::Dead { revive_at } if now >= revive_at => Some(entity),
                    _ => None,
                })
                .collect();
            for entity in due {
                if let Err(err) = self.revive(entity, now) {
                    warn!(%entity, error = %err, "auto-revive failed");
                }
            }
        }

        let living: Vec<_> = self
            .players
            .iter()
            .filter(|(_, r)| r.phase == Phase::Alive)
            .map(|(&entity, _)| entity)
            .collect();
        for entity in living {
            self.regenerate(entity, now);
        }
    }

    fn regenerate(&mut self, entity: PlayerEntity, now: Duration) {
        let Some(state) = self.channel.state(entity) else {
            return;
        };
        let Some(record) = self.players.get_mut(&entity) else {
            return;
        };
        if state.is_full() {
            record.regen.idle();
            return;
        }

        let due = record.regen.due(now, &self.policy);
        for _ in 0..due {
            match self.heal(entity, self.policy.amount) {
                Ok(Outcome::Applied) => {}
                Ok(_) => break,
                Err(err) => {
                    warn!(%entity, error = %err, "regeneration heal failed");
                    break;
                }
            }
        }
    }

    // ── Views ────────────────────────────────────────────────────────────────

    /// Authoritative state of an entity.
    #[must_use]
    pub fn state(&self, entity: PlayerEntity) -> Option<CombatState> {
        self.channel.state(entity)
    }

    /// Authority-side life phase of an entity.
    #[must_use]
    pub fn phase(&self, entity: PlayerEntity) -> Option<Phase> {
        self.players.get(&entity).map(|r| r.phase)
    }

    /// Regeneration schedule of an entity.
    #[must_use]
    pub fn regen(&self, entity: PlayerEntity) -> Option<&RegenState> {
        self.players.get(&entity).map(|r| &r.regen)
    }

    /// Number of spawned players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Full state for a late joiner or a resync.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.channel.snapshot()
    }

    /// Take every broadcast produced since the last drain.
    pub fn drain_broadcasts(&mut self) -> Vec<Broadcast> {
        self.channel.drain_outbox()
    }

    /// `Ok(Some(state))` while alive, `Ok(None)` while dead.
    fn alive_state(&self, target: PlayerEntity) -> Result<Option<CombatState>, RequestError> {
        let phase = self
            .phase(target)
            .ok_or(RequestError::UnknownTarget(target))?;
        let state = self
            .channel
            .state(target)
            .ok_or(RequestError::UnknownTarget(target))?;
        Ok((phase == Phase::Alive).then_some(state))
    }
}

fn validate_amount(amount: f32) -> Result<f32, RequestError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(RequestError::InvalidAmount(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_core::ObserverReplica;

    const T0: Duration = Duration::ZERO;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn authority() -> DamageAuthority {
        DamageAuthority::new(AuthorityConfig::default()).unwrap()
    }

    fn assert_invariants(state: CombatState) {
        assert!(state.health >= 0.0 && state.health <= state.max_health);
        assert_eq!(state.alive(), state.health > 0.0);
    }

    #[test]
    fn test_join_spawns_at_full_health() {
        let mut auth = authority();
        let (identity, entity) = auth.join(1, "alice", T0).unwrap();
        assert!(identity.is_set());
        assert_eq!(auth.state(entity), Some(CombatState::full(100.0)));
        assert_eq!(auth.phase(entity), Some(Phase::Alive));
        assert!(matches!(
            auth.drain_broadcasts().as_slice(),
            [Broadcast::Spawned(_)]
        ));
    }

    #[test]
    fn test_rejoin_keeps_identity_and_entity() {
        let mut auth = authority();
        let first = auth.join(1, "alice", T0).unwrap();
        let again = auth.join(1, "alice", secs(1)).unwrap();
        assert_eq!(first, again);
        assert_eq!(auth.player_count(), 1);
    }

    #[test]
    fn test_reconnect_after_leave_keeps_identity() {
        let mut auth = authority();
        let (identity, entity) = auth.join(1, "alice", T0).unwrap();
        assert!(auth.leave(entity));
        assert!(!auth.leave(entity));
        let (identity2, entity2) = auth.join(1, "alice", secs(2)).unwrap();
        assert_eq!(identity, identity2);
        assert_ne!(entity, entity2);
    }

    #[test]
    fn test_lobby_full() {
        let mut auth = DamageAuthority::new(AuthorityConfig {
            max_players: 1,
            ..AuthorityConfig::default()
        })
        .unwrap();
        auth.join(1, "alice", T0).unwrap();
        let err = auth.join(2, "bob", T0).unwrap_err();
        assert_eq!(err, RequestError::LobbyFull { max_players: 1 });
    }

    #[test]
    fn test_hit_death_revive_scenario() {
        let mut auth = authority();
        let (a, _) = auth.join(1, "a", T0).unwrap();
        let (b, _) = auth.join(2, "b", T0).unwrap();
        let (_, target) = auth.join(3, "target", T0).unwrap();

        assert_eq!(auth.report_hit(target, 30.0, a, secs(1)), Ok(Outcome::Applied));
        let state = auth.state(target).unwrap();
        assert_eq!(state.health, 70.0);
        assert_eq!(state.last_damage_source, Some(a));

        let killed = auth.report_hit(target, 85.0, b, secs(2)).unwrap();
        assert_eq!(
            killed,
            Outcome::Killed {
                killer: Killer::Player(b)
            }
        );
        let state = auth.state(target).unwrap();
        assert_eq!(state.health, 0.0);
        assert_eq!(state.life.killer(), Some(Killer::Player(b)));
        assert_eq!(state.last_damage_source, Some(b));
        assert_invariants(state);

        assert_eq!(
            auth.report_hit(target, 10.0, a, secs(3)),
            Ok(Outcome::Ignored(IgnoreReason::TargetDead))
        );
        assert_eq!(auth.state(target).unwrap().last_damage_source, Some(b));

        assert_eq!(auth.revive(target, secs(4)), Ok(Outcome::Applied));
        let state = auth.state(target).unwrap();
        assert_eq!(state, CombatState::full(100.0));
    }

    #[test]
    fn test_lethal_hit_is_one_change_set() {
        let mut auth = authority();
        let (shooter, _) = auth.join(1, "a", T0).unwrap();
        let (_, target) = auth.join(2, "b", T0).unwrap();
        auth.drain_broadcasts();

        auth.report_hit(target, 150.0, shooter, secs(1)).unwrap();
        let out = auth.drain_broadcasts();
        assert_eq!(out.len(), 1);
        let Broadcast::Changed(set) = &out[0] else {
            panic!("expected change set");
        };
        assert_eq!(set.changes.len(), 3);
    }

    #[test]
    fn test_environment_kill() {
        let mut auth = authority();
        let (_, target) = auth.join(1, "a", T0).unwrap();
        let outcome = auth
            .report_hit(target, 100.0, CombatIdentity::UNSET, T0)
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Killed {
                killer: Killer::Environment
            }
        );
        assert_eq!(auth.state(target).unwrap().last_damage_source, None);
    }

    #[test]
    fn test_invalid_amounts_rejected_without_broadcast() {
        let mut auth = authority();
        let (source, target) = auth.join(1, "a", T0).unwrap();
        auth.drain_broadcasts();

        for amount in [-1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                auth.report_hit(target, amount, source, T0),
                Err(RequestError::InvalidAmount(_))
            ));
            assert!(matches!(
                auth.heal(target, amount),
                Err(RequestError::InvalidAmount(_))
            ));
        }
        assert_eq!(auth.state(target), Some(CombatState::full(100.0)));
        assert!(auth.drain_broadcasts().is_empty());
    }

    #[test]
    fn test_unknown_target_rejected() {
        let mut auth = authority();
        let ghost = PlayerEntity(42);
        assert_eq!(
            auth.handle(CombatRequest::Heal { target: ghost, amount: 5.0 }, T0),
            Err(RequestError::UnknownTarget(ghost))
        );
        assert_eq!(
            auth.revive(ghost, T0),
            Err(RequestError::UnknownTarget(ghost))
        );
    }

    #[test]
    fn test_heal_caps_and_ignores() {
        let mut auth = authority();
        let (source, target) = auth.join(1, "a", T0).unwrap();
        assert_eq!(
            auth.heal(target, 10.0),
            Ok(Outcome::Ignored(IgnoreReason::AtMaxHealth))
        );
        auth.report_hit(target, 20.0, source, T0).unwrap();
        auth.heal(target, 50.0).unwrap();
        assert_eq!(auth.state(target).unwrap().health, 100.0);

        auth.report_hit(target, 100.0, source, T0).unwrap();
        assert_eq!(
            auth.heal(target, 10.0),
            Ok(Outcome::Ignored(IgnoreReason::TargetDead))
        );
    }

    #[test]
    fn test_revive_living_is_ignored() {
        let mut auth = authority();
        let (_, target) = auth.join(1, "a", T0).unwrap();
        auth.drain_broadcasts();
        assert_eq!(
            auth.revive(target, T0),
            Ok(Outcome::Ignored(IgnoreReason::NotDead))
        );
        assert!(auth.drain_broadcasts().is_empty());
    }

    #[test]
    fn test_request_revive_waits_for_deadline() {
        let mut auth = DamageAuthority::new(AuthorityConfig {
            auto_revive: false,
            ..AuthorityConfig::default()
        })
        .unwrap();
        let (source, target) = auth.join(1, "a", T0).unwrap();
        auth.report_hit(target, 100.0, source, secs(10)).unwrap();
        assert_eq!(
            auth.phase(target),
            Some(Phase::Dead {
                revive_at: secs(15)
            })
        );

        let early = CombatRequest::Revive { target };
        assert_eq!(
            auth.handle(early, secs(12)),
            Ok(Outcome::Ignored(IgnoreReason::NotYetEligible))
        );
        auth.tick(secs(20));
        assert!(!auth.state(target).unwrap().alive());

        assert_eq!(auth.handle(early, secs(15)), Ok(Outcome::Applied));
        assert!(auth.state(target).unwrap().alive());
    }

    #[test]
    fn test_auto_revive_on_tick() {
        let mut auth = authority();
        let (source, target) = auth.join(1, "a", T0).unwrap();
        auth.report_hit(target, 100.0, source, secs(1)).unwrap();

        auth.tick(secs(5));
        assert!(!auth.state(target).unwrap().alive());
        auth.tick(secs(6));
        assert_eq!(auth.state(target), Some(CombatState::full(100.0)));
        assert_eq!(auth.phase(target), Some(Phase::Alive));
    }

    #[test]
    fn test_regeneration_40_to_100() {
        let mut auth = authority();
        let (source, target) = auth.join(1, "a", T0).unwrap();
        auth.report_hit(target, 60.0, source, T0).unwrap();

        let mut seen = Vec::new();
        for s in 0..=15 {
            auth.tick(secs(s));
            seen.push(auth.state(target).unwrap().health);
        }
        // Grace ends at 5 s, first heal at 6 s.
        assert_eq!(&seen[..6], &[40.0; 6]);
        assert_eq!(&seen[6..11], &[55.0, 70.0, 85.0, 100.0, 100.0]);
        assert!(seen.iter().all(|h| *h <= 100.0));
        assert!(!auth.regen(target).unwrap().is_active());
    }

    #[test]
    fn test_regeneration_does_not_overshoot() {
        let mut auth = authority();
        let (source, target) = auth.join(1, "a", T0).unwrap();
        auth.report_hit(target, 5.0, source, T0).unwrap();
        auth.tick(secs(6));
        assert_eq!(auth.state(target).unwrap().health, 100.0);
    }

    #[test]
    fn test_damage_delays_regeneration() {
        let mut auth = authority();
        let (source, target) = auth.join(1, "a", T0).unwrap();
        auth.report_hit(target, 50.0, source, T0).unwrap();
        auth.tick(secs(4));
        auth.report_hit(target, 10.0, source, secs(4)).unwrap();
        auth.tick(secs(9));
        assert_eq!(auth.state(target).unwrap().health, 40.0);
        auth.tick(secs(10));
        assert_eq!(auth.state(target).unwrap().health, 55.0);
    }

    #[test]
    fn test_invariants_hold_over_mixed_traffic() {
        let mut auth = authority();
        let (a, target) = auth.join(1, "a", T0).unwrap();
        let (b, _) = auth.join(2, "b", T0).unwrap();
        let mut replica = ObserverReplica::new();

        let mut seed: u32 = 7;
        for step in 0..500u64 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let now = Duration::from_millis(step * 250);
            let amount = (seed >> 16) as f32 % 60.0;
            let source = if seed & 1 == 0 { a } else { b };
            let request = match (seed >> 8) % 4 {
                0 | 1 => CombatRequest::Hit {
                    target,
                    amount,
                    source,
                },
                2 => CombatRequest::Heal { target, amount },
                _ => CombatRequest::Revive { target },
            };
            let _ = auth.handle(request, now);
            auth.tick(now);
            assert_invariants(auth.state(target).unwrap());

            for broadcast in auth.drain_broadcasts() {
                let report = replica.apply(&broadcast);
                assert!(!report.needs_resync);
                for (_, observed) in replica.entities() {
                    assert_invariants(observed.state());
                }
            }
            assert_eq!(replica.state(target), auth.state(target));
        }
    }
}
