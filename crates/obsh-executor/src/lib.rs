//! Input classification and execution bridge.
//!
//! Provides:
//! - `classify` - Quit / annotation / executable priority rule
//! - `ExecutionBridge` - Spawn with inherited stdio, outcome tracking,
//!   fire-and-forget remote notification
//! - Shell selection for the current platform

pub mod bridge;
pub mod classify;
pub mod shell;

pub use bridge::{BridgeError, ExecutionBridge, ExecutionRecord};
pub use classify::{InputClass, QUIT_TOKENS, classify};
pub use shell::shell_command;
