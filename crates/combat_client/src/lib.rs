//! # combat_client
//!
//! Everything a player process needs to take part in a match.
//!
//! - [`CombatSession`] — routes local combat input to the authority (in
//!   process on the host, as forwarded requests elsewhere) and turns
//!   replicated broadcasts into lifecycle and control changes.
//! - [`DeathLifecycle`] — per-entity death countdown, gated on the
//!   replicated life state.
//! - [`ControlSurface`] / [`IdentityDirectory`] — seams to the game's
//!   input layer and player directory.
//! - [`ObserverRunner`] — connects a session to a host over NATS.

pub mod config;
pub mod controls;
pub mod directory;
pub mod lifecycle;
pub mod runner;
pub mod session;

pub use config::ClientConfig;
pub use controls::{ControlSurface, LoggingControls};
pub use directory::{IdentityDirectory, InMemoryDirectory};
pub use lifecycle::DeathLifecycle;
pub use runner::ObserverRunner;
pub use session::{CombatSession, Dispatch};
