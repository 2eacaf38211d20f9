//! # combat_net
//!
//! NATS transport layer for authoritative combat replication.
//!
//! This crate provides:
//!
//! - [`subjects`] — NATS subject builders, scoped per lobby.
//! - [`messages`] — Message types exchanged between the host and observers.
//! - [`codec`] — MessagePack serialisation/deserialisation helpers.
//! - [`connection`] — NATS connection management.
//! - [`error`] — Network-layer error types.

pub mod codec;
pub mod connection;
pub mod error;
pub mod messages;
pub mod subjects;

pub use codec::{decode, encode};
pub use connection::NatsConnection;
pub use error::NetError;
