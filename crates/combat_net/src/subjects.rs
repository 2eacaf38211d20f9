//! NATS subject hierarchy.
//!
//! All combat subjects are prefixed with `combat.<lobby>.` so several
//! matches can share one NATS cluster.
//!
//! ```text
//! combat.<lobby>.request             observer -> host   RequestEnvelope
//! combat.<lobby>.state               host -> *          Broadcast
//! combat.<lobby>.session.join        observer -> host   JoinRequest / JoinResponse
//! combat.<lobby>.session.leave       observer -> host   LeaveNotice
//! combat.<lobby>.session.heartbeat   observer -> host   Heartbeat
//! combat.<lobby>.sync                observer -> host   SyncRequest / Snapshot
//! ```

/// Root prefix for all combat NATS subjects.
pub const PREFIX: &str = "combat";

/// Lobby used when none is configured.
pub const DEFAULT_LOBBY: &str = "default";

fn scoped(lobby: &str, leaf: &str) -> String {
    format!("{PREFIX}.{lobby}.{leaf}")
}

/// Mutation requests from observers. Observer -> Host.
///
/// `combat.<lobby>.request`
#[must_use]
pub fn request(lobby: &str) -> String {
    scoped(lobby, "request")
}

/// Authoritative state broadcasts. Host -> *.
///
/// `combat.<lobby>.state`
#[must_use]
pub fn state(lobby: &str) -> String {
    scoped(lobby, "state")
}

/// Join handshake (request/reply). Observer -> Host.
///
/// `combat.<lobby>.session.join`
#[must_use]
pub fn session_join(lobby: &str) -> String {
    scoped(lobby, "session.join")
}

/// Graceful leave. Observer -> Host.
///
/// `combat.<lobby>.session.leave`
#[must_use]
pub fn session_leave(lobby: &str) -> String {
    scoped(lobby, "session.leave")
}

/// Liveness heartbeat. Observer -> Host.
///
/// `combat.<lobby>.session.heartbeat`
#[must_use]
pub fn session_heartbeat(lobby: &str) -> String {
    scoped(lobby, "session.heartbeat")
}

/// Late-join sync (request/reply). Observer -> Host.
///
/// `combat.<lobby>.sync`
#[must_use]
pub fn sync(lobby: &str) -> String {
    scoped(lobby, "sync")
}
