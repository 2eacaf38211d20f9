//! Observer runner — connects a [`CombatSession`] to a host over NATS.
//!
//! The runner joins the lobby, applies the join snapshot, then drives the
//! session from a single task that selects between incoming broadcasts, the
//! local tick, and the heartbeat timer.
//!
//! A failed resync is retried on the next tick. If the host despawns this
//! process's own player (heartbeat timeout), the runner joins again and
//! applies the fresh snapshot.

use std::future::Future;

use anyhow::{Result, bail};
use futures::StreamExt;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use combat_core::{ApplyReport, Broadcast, CombatEvent, PlayerEntity, Snapshot};
use combat_net::messages::{
    Heartbeat, JoinRequest, JoinResponse, LeaveNotice, RequestEnvelope, SyncRequest,
};
use combat_net::{NatsConnection, subjects};

use crate::config::ClientConfig;
use crate::controls::ControlSurface;
use crate::session::CombatSession;

/// Recovery work left over from applied broadcasts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Recovery {
    /// A full snapshot is needed.
    resync: bool,
    /// The host despawned our player; the join handshake must be redone.
    rejoin: bool,
}

impl Recovery {
    fn observe(&mut self, report: &ApplyReport, local: Option<PlayerEntity>) {
        self.resync |= report.needs_resync;
        self.rejoin |= report.events.iter().any(|event| {
            matches!(event, CombatEvent::Despawned { entity } if Some(*entity) == local)
        });
    }
}

/// Runs a non-hosting player process.
#[derive(Debug)]
pub struct ObserverRunner {
    /// Client configuration.
    config: ClientConfig,
    /// Unique instance identifier for this process.
    instance_id: String,
}

impl ObserverRunner {
    /// Create a new observer runner.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let instance_id = Uuid::new_v4().to_string();
        Self {
            config,
            instance_id,
        }
    }

    /// Returns the unique instance ID for this runner.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the join handshake for this process.
    #[must_use]
    pub fn join_request(&self) -> JoinRequest {
        JoinRequest {
            observer_id: self.instance_id.clone(),
            account_id: self.config.account_id,
            display_name: self.config.display_name.clone(),
        }
    }

    /// Run the observer until `shutdown` resolves or the host goes away.
    ///
    /// 1. Connect to NATS and subscribe to the state subject.
    /// 2. Join the lobby and apply the join snapshot.
    /// 3. Loop: apply broadcasts, tick the session and forward its requests,
    ///    send heartbeats. Gaps schedule a resync and losing our own player
    ///    schedules a rejoin; both are retried each tick until they succeed.
    /// 4. Send a leave notice.
    ///
    /// # Errors
    ///
    /// Returns an error if NATS fails or the host rejects the first join.
    pub async fn run<C, S>(self, mut session: CombatSession<C>, shutdown: S) -> Result<()>
    where
        C: ControlSurface,
        S: Future<Output = ()>,
    {
        let url = combat_net::connection::resolve_url(self.config.nats_url.as_deref());
        let lobby = self.config.lobby.as_str();
        info!(
            lobby,
            instance_id = self.instance_id,
            url,
            "observer starting"
        );

        let conn = NatsConnection::connect_to(&url).await?;

        // Subscribe before joining so nothing published after the join
        // snapshot is missed.
        let mut state_sub = conn.subscribe(&subjects::state(lobby)).await?;

        let start = Instant::now();
        self.join(&conn, &mut session, start).await?;
        let mut recovery = Recovery::default();

        let request_subject = subjects::request(lobby);
        let heartbeat_subject = subjects::session_heartbeat(lobby);

        let mut tick = tokio::time::interval(self.config.tick_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                msg = state_sub.next() => {
                    let Some(msg) = msg else {
                        warn!("state subscription closed");
                        break;
                    };
                    let broadcast: Broadcast = match combat_net::decode(msg.payload.as_ref()) {
                        Ok(b) => b,
                        Err(err) => {
                            warn!(error = %err, "dropping undecodable broadcast");
                            continue;
                        }
                    };
                    let report = session.apply_broadcast(&broadcast, start.elapsed());
                    recovery.observe(&report, session.local().map(|(_, entity)| entity));
                }
                _ = tick.tick() => {
                    if recovery.rejoin {
                        warn!("own player despawned by host, joining again");
                        match self.join(&conn, &mut session, start).await {
                            Ok(()) => recovery = Recovery::default(),
                            Err(err) => warn!(error = %err, "rejoin failed, retrying"),
                        }
                    } else if recovery.resync {
                        match self.resync(&conn, &mut session, start).await {
                            Ok(()) => recovery.resync = false,
                            Err(err) => warn!(error = %err, "resync failed, retrying"),
                        }
                    }

                    session.tick(start.elapsed());
                    let requests = session.drain_requests();
                    if recovery.rejoin {
                        debug!(dropped = requests.len(), "not joined, dropping requests");
                        continue;
                    }
                    for request in requests {
                        let envelope = RequestEnvelope {
                            observer_id: self.instance_id.clone(),
                            request,
                        };
                        conn.publish(&request_subject, &envelope).await?;
                    }
                }
                _ = heartbeat.tick() => {
                    let beat = Heartbeat { observer_id: self.instance_id.clone() };
                    conn.publish(&heartbeat_subject, &beat).await?;
                }
            }
        }

        let leave = LeaveNotice {
            observer_id: self.instance_id.clone(),
        };
        conn.publish(&subjects::session_leave(lobby), &leave).await?;
        info!(instance_id = self.instance_id, "left match");
        Ok(())
    }

    async fn join<C: ControlSurface>(
        &self,
        conn: &NatsConnection,
        session: &mut CombatSession<C>,
        start: Instant,
    ) -> Result<()> {
        let response: JoinResponse = conn
            .request(&subjects::session_join(&self.config.lobby), &self.join_request())
            .await?;
        let (identity, entity, snapshot) = match response {
            JoinResponse::Accepted {
                identity,
                entity,
                snapshot,
            } => (identity, entity, snapshot),
            JoinResponse::Rejected { reason } => bail!("join rejected: {reason}"),
        };

        session.set_local(identity, entity);
        session.apply_snapshot(&snapshot, start.elapsed());
        info!(%identity, %entity, players = snapshot.entities.len(), "joined match");
        Ok(())
    }

    async fn resync<C: ControlSurface>(
        &self,
        conn: &NatsConnection,
        session: &mut CombatSession<C>,
        start: Instant,
    ) -> Result<()> {
        debug!("requesting resync");
        let request = SyncRequest {
            observer_id: self.instance_id.clone(),
        };
        let snapshot: Snapshot = conn
            .request(&subjects::sync(&self.config.lobby), &request)
            .await?;
        let report = session.apply_snapshot(&snapshot, start.elapsed());
        info!(
            entities = snapshot.entities.len(),
            events = report.events.len(),
            "resynced"
        );
        Ok(())
    }
}
