//! Combat session — one player process's view of the match.
//!
//! A session always owns an [`ObserverReplica`]. On the host it also owns
//! the [`DamageAuthority`]; combat input is then applied in process and the
//! authority's broadcasts are fed back into the local replica as they are
//! drained. Without an authority, input is queued as [`CombatRequest`]s for
//! the runner to forward, and nothing local changes until the resulting
//! broadcast comes back.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use combat_authority::{DamageAuthority, Outcome, RequestError};
use combat_core::{
    ApplyReport, Broadcast, CombatEvent, CombatIdentity, CombatRequest, CombatState,
    ObserverReplica, PlayerEntity, Snapshot,
};
use tracing::{debug, info};

use crate::controls::ControlSurface;
use crate::directory::{IdentityDirectory, InMemoryDirectory};
use crate::lifecycle::DeathLifecycle;

/// Where a combat operation went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Applied by the in-process authority.
    Local(Outcome),
    /// Queued for the authority; see [`CombatSession::drain_requests`].
    Forwarded,
}

/// One process's combat session.
pub struct CombatSession<C: ControlSurface> {
    replica: ObserverReplica,
    authority: Option<DamageAuthority>,
    lifecycles: BTreeMap<PlayerEntity, DeathLifecycle>,
    outgoing: Vec<CombatRequest>,
    directory: Arc<dyn IdentityDirectory>,
    controls: C,
    respawn_delay: Duration,
    local: Option<(CombatIdentity, PlayerEntity)>,
}

impl<C: ControlSurface> std::fmt::Debug for CombatSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatSession")
            .field("replica", &self.replica)
            .field("authority", &self.authority.is_some())
            .field("lifecycles", &self.lifecycles)
            .field("outgoing", &self.outgoing.len())
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

impl<C: ControlSurface> CombatSession<C> {
    /// A session without authority.
    #[must_use]
    pub fn new(controls: C, respawn_delay: Duration) -> Self {
        Self {
            replica: ObserverReplica::new(),
            authority: None,
            lifecycles: BTreeMap::new(),
            outgoing: Vec::new(),
            directory: Arc::new(InMemoryDirectory::new()),
            controls,
            respawn_delay,
            local: None,
        }
    }

    /// Make this the hosting session.
    #[must_use]
    pub fn with_authority(mut self, authority: DamageAuthority) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Use a shared identity directory.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn IdentityDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Returns `true` if this session holds the authority.
    #[must_use]
    pub fn is_authority(&self) -> bool {
        self.authority.is_some()
    }

    /// The in-process authority, if hosting.
    #[must_use]
    pub fn authority(&self) -> Option<&DamageAuthority> {
        self.authority.as_ref()
    }

    /// Mutable access to the in-process authority, for session management
    /// (join, leave) on the host.
    pub fn authority_mut(&mut self) -> Option<&mut DamageAuthority> {
        self.authority.as_mut()
    }

    /// Record which player this process controls.
    pub fn set_local(&mut self, identity: CombatIdentity, entity: PlayerEntity) {
        self.local = Some((identity, entity));
    }

    /// The player this process controls.
    #[must_use]
    pub fn local(&self) -> Option<(CombatIdentity, PlayerEntity)> {
        self.local
    }

    // ── Input ────────────────────────────────────────────────────────────────

    /// Report a locally detected hit.
    ///
    /// # Errors
    ///
    /// On the host, returns the authority's rejection. Forwarded requests
    /// never fail here.
    pub fn report_hit(
        &mut self,
        target: PlayerEntity,
        amount: f32,
        source: CombatIdentity,
        now: Duration,
    ) -> Result<Dispatch, RequestError> {
        self.submit(
            CombatRequest::Hit {
                target,
                amount,
                source,
            },
            now,
        )
    }

    /// Ask for a heal.
    ///
    /// # Errors
    ///
    /// See [`report_hit`](Self::report_hit).
    pub fn heal(
        &mut self,
        target: PlayerEntity,
        amount: f32,
        now: Duration,
    ) -> Result<Dispatch, RequestError> {
        self.submit(CombatRequest::Heal { target, amount }, now)
    }

    /// Ask for a revive. The authority decides eligibility.
    ///
    /// # Errors
    ///
    /// See [`report_hit`](Self::report_hit).
    pub fn request_revive(
        &mut self,
        target: PlayerEntity,
        now: Duration,
    ) -> Result<Dispatch, RequestError> {
        self.submit(CombatRequest::Revive { target }, now)
    }

    /// Route a request to the in-process authority or the outgoing queue.
    ///
    /// # Errors
    ///
    /// See [`report_hit`](Self::report_hit).
    pub fn submit(
        &mut self,
        request: CombatRequest,
        now: Duration,
    ) -> Result<Dispatch, RequestError> {
        match self.authority.as_mut() {
            Some(authority) => authority.handle(request, now).map(Dispatch::Local),
            None => {
                debug!(entity = %request.target(), "forwarding request");
                self.outgoing.push(request);
                Ok(Dispatch::Forwarded)
            }
        }
    }

    /// Take every queued request, oldest first.
    pub fn drain_requests(&mut self) -> Vec<CombatRequest> {
        std::mem::take(&mut self.outgoing)
    }

    // ── Replication ──────────────────────────────────────────────────────────

    /// Take the authority's broadcasts for publishing, applying each to the
    /// local replica first. Empty when not hosting.
    pub fn drain_broadcasts(&mut self, now: Duration) -> Vec<Broadcast> {
        let Some(authority) = self.authority.as_mut() else {
            return Vec::new();
        };
        let broadcasts = authority.drain_broadcasts();
        for broadcast in &broadcasts {
            self.apply_broadcast(broadcast, now);
        }
        broadcasts
    }

    /// Full authoritative state, when hosting.
    #[must_use]
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.authority.as_ref().map(DamageAuthority::snapshot)
    }

    /// Apply a broadcast received from the authority.
    pub fn apply_broadcast(&mut self, broadcast: &Broadcast, now: Duration) -> ApplyReport {
        if let Broadcast::Spawned(spawned) = broadcast {
            self.directory
                .record(spawned.identity, spawned.profile.clone());
        }
        let report = self.replica.apply(broadcast);
        self.process(&report.events, now);
        report
    }

    /// Apply a full snapshot (late join or resync).
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot, now: Duration) -> ApplyReport {
        for entity in &snapshot.entities {
            self.directory
                .record(entity.identity, entity.profile.clone());
        }
        let report = self.replica.apply_snapshot(snapshot);
        self.process(&report.events, now);
        report
    }

    /// Advance timers: the authority tick when hosting, then local death
    /// countdowns. An elapsed countdown on the local player queues or
    /// applies one revive request.
    pub fn tick(&mut self, now: Duration) {
        if let Some(authority) = self.authority.as_mut() {
            authority.tick(now);
        }

        let local = self.local.map(|(_, entity)| entity);
        let elapsed: Vec<_> = self
            .lifecycles
            .iter_mut()
            .filter_map(|(&entity, lifecycle)| lifecycle.tick(now).then_some(entity))
            .collect();
        for entity in elapsed {
            if Some(entity) != local {
                continue;
            }
            debug!(%entity, "death countdown elapsed, requesting revive");
            if let Err(err) = self.request_revive(entity, now) {
                debug!(%entity, error = %err, "revive request failed");
            }
        }
    }

    fn process(&mut self, events: &[CombatEvent], now: Duration) {
        for event in events {
            match *event {
                CombatEvent::Spawned { entity, identity } => {
                    self.lifecycles.insert(entity, DeathLifecycle::new());
                    debug!(%entity, %identity, "entity observed");
                }
                CombatEvent::HealthChanged { entity, old, new } => {
                    debug!(%entity, old, new, "health changed");
                }
                CombatEvent::Died { entity, killer } => {
                    let lifecycle = self.lifecycles.entry(entity).or_default();
                    if lifecycle.on_death(killer, now + self.respawn_delay) {
                        self.controls.set_controls_enabled(entity, false);
                        self.controls.set_weapons_enabled(entity, false);
                        let by = killer.identity().map_or_else(
                            || "environment".to_string(),
                            |id| self.directory.display_name(id),
                        );
                        info!(%entity, killer = %by, "player died");
                    }
                }
                CombatEvent::Revived { entity } => {
                    let lifecycle = self.lifecycles.entry(entity).or_default();
                    if lifecycle.on_revive() {
                        self.controls.set_controls_enabled(entity, true);
                        self.controls.set_weapons_enabled(entity, true);
                        info!(%entity, "player revived");
                    }
                }
                CombatEvent::Despawned { entity } => {
                    self.lifecycles.remove(&entity);
                    debug!(%entity, "entity gone");
                }
            }
        }
    }

    // ── Views ────────────────────────────────────────────────────────────────

    /// The replicated state of an entity.
    #[must_use]
    pub fn state(&self, entity: PlayerEntity) -> Option<CombatState> {
        self.replica.state(entity)
    }

    /// The local mirror.
    #[must_use]
    pub fn replica(&self) -> &ObserverReplica {
        &self.replica
    }

    /// Mutable mirror access, for subscribing to field changes.
    pub fn replica_mut(&mut self) -> &mut ObserverReplica {
        &mut self.replica
    }

    /// Death countdown of an entity.
    #[must_use]
    pub fn lifecycle(&self, entity: PlayerEntity) -> Option<&DeathLifecycle> {
        self.lifecycles.get(&entity)
    }

    /// The identity directory.
    #[must_use]
    pub fn directory(&self) -> &Arc<dyn IdentityDirectory> {
        &self.directory
    }

    /// The control surface.
    #[must_use]
    pub fn controls(&self) -> &C {
        &self.controls
    }
}
