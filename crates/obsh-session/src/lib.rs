//! Session coordinator: one terminal, one prompt, one process at a time.
//!
//! Serializes the three things that compete for the session: the local
//! prompt, spawned processes, and remote-originated inputs arriving over
//! the push channel.

pub mod coordinator;

pub use coordinator::{SessionCoordinator, SessionError};
