//! # combat_core
//!
//! Data model and replication substrate for authoritative combat state.
//!
//! This crate provides:
//!
//! - [`CombatIdentity`] — stable per-player identity used for attribution.
//! - [`PlayerEntity`] — authority-allocated entity handles.
//! - [`CombatState`] — the per-player combat record and its invariants.
//! - [`ReplicatedField`] — sequence-numbered replicated values.
//! - [`AuthorityChannel`] — the only write path, owned by the authority.
//! - [`ObserverReplica`] — the read-only mirror every process keeps.
//! - [`CombatRequest`] — mutations forwarded from observers to the authority.

pub mod channel;
pub mod entity;
pub mod events;
pub mod field;
pub mod identity;
pub mod replica;
pub mod request;
pub mod snapshot;
pub mod state;

pub use channel::{AuthorityChannel, Broadcast, ChannelError};
pub use entity::{EntityAllocator, PlayerEntity};
pub use events::{CombatEvent, FieldChanged, SubscriptionId, Subscribers};
pub use field::{ChangeSet, FieldChange, FieldId, FieldValue, ReplicatedField, Versioned};
pub use identity::{CombatIdentity, IdentityAllocator, Killer, PlayerProfile};
pub use replica::{ApplyReport, ObservedEntity, ObserverReplica};
pub use request::CombatRequest;
pub use snapshot::{EntitySnapshot, Snapshot};
pub use state::{CombatState, LifeState, StateError};
