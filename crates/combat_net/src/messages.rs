//! Message types exchanged between the host and observers.
//!
//! Broadcasts and snapshots are the [`combat_core`] types themselves; this
//! module adds the session handshake and the envelopes that carry routing
//! data alongside a payload.

use combat_core::{CombatIdentity, CombatRequest, PlayerEntity, Snapshot};
use serde::{Deserialize, Serialize};

// ── Requests ────────────────────────────────────────────────────────────────

/// A combat request tagged with the observer that sent it.
/// Published on [`subjects::request`](crate::subjects::request).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Instance id of the sending observer.
    pub observer_id: String,
    /// The requested mutation.
    pub request: CombatRequest,
}

// ── Session ─────────────────────────────────────────────────────────────────

/// An observer asks to join the match.
/// Sent as a request on [`subjects::session_join`](crate::subjects::session_join).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Unique per-process instance id (UUID).
    pub observer_id: String,
    /// Platform account. Reconnecting with the same account keeps the same
    /// combat identity.
    pub account_id: u64,
    /// Name shown to other players.
    pub display_name: String,
}

/// The host's answer to a [`JoinRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinResponse {
    /// The observer is in. The snapshot is its late-join sync.
    Accepted {
        /// The player's combat identity.
        identity: CombatIdentity,
        /// The entity the player controls.
        entity: PlayerEntity,
        /// Full authoritative state at the moment of joining.
        snapshot: Snapshot,
    },
    /// The host refused the join.
    Rejected {
        /// Why.
        reason: String,
    },
}

/// An observer is leaving. Published on
/// [`subjects::session_leave`](crate::subjects::session_leave).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveNotice {
    /// The leaving observer.
    pub observer_id: String,
}

/// Periodic liveness report. Published on
/// [`subjects::session_heartbeat`](crate::subjects::session_heartbeat).
///
/// Observers that stop heart-beating are treated as disconnected and their
/// player entity is despawned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// The reporting observer.
    pub observer_id: String,
}

/// An observer asks for a full snapshot after detecting a gap.
/// Sent as a request on [`subjects::sync`](crate::subjects::sync); the reply
/// is a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// The requesting observer.
    pub observer_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_roundtrip() {
        let msg = RequestEnvelope {
            observer_id: "obs-1".to_string(),
            request: CombatRequest::Hit {
                target: PlayerEntity(2),
                amount: 25.0,
                source: CombatIdentity(4),
            },
        };
        let bytes = crate::encode(&msg).unwrap();
        let restored: RequestEnvelope = crate::decode(&bytes).unwrap();
        assert_eq!(restored, msg);
    }

    #[test]
    fn test_join_rejected_roundtrip() {
        let msg = JoinResponse::Rejected {
            reason: "lobby full".to_string(),
        };
        let bytes = crate::encode(&msg).unwrap();
        let restored: JoinResponse = crate::decode(&bytes).unwrap();
        assert_eq!(restored, msg);
    }
}
