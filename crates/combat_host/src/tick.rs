//! Host tick loop.
//!
//! One task owns the hosting [`CombatSession`]. Each tick:
//!
//! 1. Expire observers that stopped heart-beating and despawn their players.
//! 2. Advance the authority (auto-revive, regeneration) and local countdowns.
//! 3. Publish every broadcast produced since the last flush.
//!
//! Between ticks the same task answers join, sync and leave messages and
//! applies forwarded combat requests, so nothing touches combat state
//! concurrently.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use combat_client::{CombatSession, ControlSurface, Dispatch};
use combat_core::{Broadcast, Snapshot};
use combat_net::messages::{
    Heartbeat, JoinRequest, JoinResponse, LeaveNotice, RequestEnvelope, SyncRequest,
};
use combat_net::{NatsConnection, subjects};

use crate::registry::ObserverRegistry;

/// Configuration for the host tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Silence after which an observer is considered disconnected.
    pub observer_timeout: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30.0,
            max_ticks: 0,
            observer_timeout: Duration::from_secs(5),
        }
    }
}

impl TickConfig {
    /// Duration of one tick.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }
}

/// The host's tick loop state.
#[derive(Debug)]
pub struct TickLoop<C: ControlSurface> {
    /// Current tick counter.
    tick_id: u64,
    /// Tick configuration.
    config: TickConfig,
    /// The hosting session. Always holds the authority.
    session: CombatSession<C>,
    /// Joined remote observers.
    registry: ObserverRegistry,
}

impl<C: ControlSurface> TickLoop<C> {
    /// Create a tick loop around a hosting session.
    #[must_use]
    pub fn new(config: TickConfig, session: CombatSession<C>) -> Self {
        Self {
            tick_id: 0,
            config,
            session,
            registry: ObserverRegistry::new(),
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Returns the hosting session.
    #[must_use]
    pub fn session(&self) -> &CombatSession<C> {
        &self.session
    }

    /// Returns the observer registry.
    #[must_use]
    pub fn registry(&self) -> &ObserverRegistry {
        &self.registry
    }

    /// Run one tick at host time `now` and return the broadcasts to publish.
    pub fn tick(&mut self, now: Duration) -> Vec<Broadcast> {
        self.tick_id += 1;

        for (observer_id, info) in self.registry.expire(now, self.config.observer_timeout) {
            warn!(observer_id, entity = %info.entity, "observer timed out");
            if let Some(authority) = self.session.authority_mut() {
                authority.leave(info.entity);
            }
        }

        self.session.tick(now);
        let broadcasts = self.session.drain_broadcasts(now);
        if !broadcasts.is_empty() {
            debug!(
                tick_id = self.tick_id,
                broadcasts = broadcasts.len(),
                "tick flushed"
            );
        }
        broadcasts
    }

    /// Admit an observer.
    pub fn handle_join(&mut self, join: &JoinRequest, now: Duration) -> JoinResponse {
        let Some(authority) = self.session.authority_mut() else {
            return JoinResponse::Rejected {
                reason: "not hosting".to_string(),
            };
        };
        match authority.join(join.account_id, &join.display_name, now) {
            Ok((identity, entity)) => {
                self.registry
                    .register(&join.observer_id, identity, entity, now);
                info!(
                    observer_id = join.observer_id,
                    %identity,
                    %entity,
                    "observer joined"
                );
                JoinResponse::Accepted {
                    identity,
                    entity,
                    snapshot: authority.snapshot(),
                }
            }
            Err(err) => {
                warn!(observer_id = join.observer_id, error = %err, "join rejected");
                JoinResponse::Rejected {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Despawn a leaving observer's player.
    pub fn handle_leave(&mut self, leave: &LeaveNotice) {
        let Some(info) = self.registry.remove(&leave.observer_id) else {
            debug!(observer_id = leave.observer_id, "leave from unknown observer");
            return;
        };
        if let Some(authority) = self.session.authority_mut() {
            authority.leave(info.entity);
        }
        info!(observer_id = leave.observer_id, entity = %info.entity, "observer left");
    }

    /// Record a heartbeat.
    pub fn handle_heartbeat(&mut self, beat: &Heartbeat, now: Duration) {
        if self.registry.touch(&beat.observer_id, now).is_none() {
            debug!(observer_id = beat.observer_id, "heartbeat from unknown observer");
        }
    }

    /// Apply a forwarded combat request from a joined observer.
    pub fn handle_request(&mut self, envelope: &RequestEnvelope, now: Duration) {
        let Some(observer) = self.registry.touch(&envelope.observer_id, now) else {
            warn!(
                observer_id = envelope.observer_id,
                "request from unjoined observer dropped"
            );
            return;
        };
        // Rejections are logged by the authority.
        if let Ok(Dispatch::Local(outcome)) = self.session.submit(envelope.request, now) {
            debug!(identity = %observer.identity, ?outcome, "request handled");
        }
    }

    /// Full state for a resyncing observer.
    pub fn handle_sync(&mut self, sync: &SyncRequest, now: Duration) -> Snapshot {
        self.registry.touch(&sync.observer_id, now);
        self.session.snapshot().unwrap_or_default()
    }

    /// Run the tick loop over NATS until `shutdown` resolves or
    /// `max_ticks` is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if subscribing or publishing fails.
    pub async fn run_async<S>(&mut self, conn: &NatsConnection, lobby: &str, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let state_subject = subjects::state(lobby);
        let mut requests = conn.subscribe(&subjects::request(lobby)).await?;
        let mut joins = conn.subscribe(&subjects::session_join(lobby)).await?;
        let mut leaves = conn.subscribe(&subjects::session_leave(lobby)).await?;
        let mut heartbeats = conn.subscribe(&subjects::session_heartbeat(lobby)).await?;
        let mut syncs = conn.subscribe(&subjects::sync(lobby)).await?;

        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let start = Instant::now();

        info!(
            lobby,
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        tokio::pin!(shutdown);
        let mut tick_count = 0u64;
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                _ = interval.tick() => {
                    let tick_start = Instant::now();
                    let broadcasts = self.tick(start.elapsed());
                    publish_all(conn, &state_subject, &broadcasts).await?;

                    tick_count += 1;
                    if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                        info!(ticks = tick_count, "tick loop complete");
                        break;
                    }
                    let elapsed = tick_start.elapsed();
                    let budget = self.config.tick_interval();
                    if elapsed > budget {
                        warn!(
                            tick_id = self.tick_id,
                            elapsed_ms = elapsed.as_millis() as u64,
                            budget_ms = budget.as_millis() as u64,
                            "tick exceeded time budget"
                        );
                    }
                }
                Some(msg) = joins.next() => {
                    match combat_net::decode::<JoinRequest>(msg.payload.as_ref()) {
                        Ok(join) => {
                            let response = self.handle_join(&join, start.elapsed());
                            conn.reply(&msg, &response).await?;
                        }
                        Err(err) => warn!(error = %err, "undecodable join request"),
                    }
                }
                Some(msg) = syncs.next() => {
                    match combat_net::decode::<SyncRequest>(msg.payload.as_ref()) {
                        Ok(sync) => {
                            let snapshot = self.handle_sync(&sync, start.elapsed());
                            conn.reply(&msg, &snapshot).await?;
                        }
                        Err(err) => warn!(error = %err, "undecodable sync request"),
                    }
                }
                Some(msg) = requests.next() => {
                    match combat_net::decode::<RequestEnvelope>(msg.payload.as_ref()) {
                        Ok(envelope) => self.handle_request(&envelope, start.elapsed()),
                        Err(err) => warn!(error = %err, "undecodable combat request"),
                    }
                }
                Some(msg) = leaves.next() => {
                    match combat_net::decode::<LeaveNotice>(msg.payload.as_ref()) {
                        Ok(leave) => self.handle_leave(&leave),
                        Err(err) => warn!(error = %err, "undecodable leave notice"),
                    }
                }
                Some(msg) = heartbeats.next() => {
                    match combat_net::decode::<Heartbeat>(msg.payload.as_ref()) {
                        Ok(beat) => self.handle_heartbeat(&beat, start.elapsed()),
                        Err(err) => warn!(error = %err, "undecodable heartbeat"),
                    }
                }
            }
        }

        // Anything produced after the last tick still goes out.
        let broadcasts = self.session.drain_broadcasts(start.elapsed());
        publish_all(conn, &state_subject, &broadcasts).await?;
        Ok(())
    }
}

async fn publish_all(conn: &NatsConnection, subject: &str, broadcasts: &[Broadcast]) -> Result<()> {
    for broadcast in broadcasts {
        conn.publish(subject, broadcast).await?;
    }
    Ok(())
}
