//! Core abstractions for observed shell sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `HistoryStore` - Process-scoped, shared log of submitted inputs
//! - `HistoryEntry` - One submitted input plus its remote id
//! - `Chunks` - The chunk sequence of one logical submission
//! - `Outcome` - Execution result used for prompt decoration
//! - Remote collaborator traits (`Notifier`, `MessageFetch`)

pub mod history;
pub mod input;
pub mod traits;

pub use history::{HistoryEntry, HistoryError, HistoryStore};
pub use input::Chunks;
pub use traits::{MessageAck, MessageFetch, Notifier, NotifyError, Outcome, RemoteMessage};
