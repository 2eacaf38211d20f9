//! # combat_authority
//!
//! The damage authority: the only code that decides health transitions.
//!
//! This crate provides:
//!
//! - [`DamageAuthority`] — applies hits, heals, deaths and revives, and
//!   drives regeneration on its own tick.
//! - [`AuthorityConfig`] — match rules (max health, regeneration, respawn).
//! - [`Roster`] — stable identities claimed per platform account.
//! - [`RegenState`] — authority-local regeneration schedule.
//!
//! Only the process holding authority constructs a [`DamageAuthority`].
//! Everything else reaches it through forwarded
//! [`CombatRequest`](combat_core::CombatRequest)s.

pub mod authority;
pub mod config;
pub mod error;
pub mod regen;
pub mod roster;

pub use authority::{DamageAuthority, IgnoreReason, Outcome, Phase};
pub use config::AuthorityConfig;
pub use error::{ConfigError, RequestError};
pub use regen::{RegenPolicy, RegenState};
pub use roster::Roster;
