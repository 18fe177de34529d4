//! oscard — session and relay core for a retro OSCAR-family instant
//! messaging server.
//!
//! This crate owns the authoritative runtime state of every signed-on
//! user and every open chat room, and the fan-out primitive that routes
//! protocol events (presence changes, instant messages, chat traffic,
//! warnings, rate-limit alerts) to the right recipients.
//!
//! Per-connection front-ends obtain a [`state::Session`] from a
//! [`state::managers::SessionManager`] (or
//! [`state::managers::ChatSessionManager`] for rooms), drive its mailbox
//! from their own task, and relay peer events through the managers. The
//! core spawns no tasks of its own.

pub mod config;
pub mod error;
pub mod metrics;
pub mod security;
pub mod state;
pub mod store;

pub use oscar_proto as proto;
