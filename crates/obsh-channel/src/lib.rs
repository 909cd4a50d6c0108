//! Push channel client and remote notification plumbing.
//!
//! Provides:
//! - Wire protocol (`Frame`, typed `ChannelEvent`, outbound `Directive`)
//! - `ConnMachine` - Pure connection state machine
//! - `ChannelClient` - WebSocket driver with liveness and reconnect
//! - `HttpRemote` - Notification and message-fetch collaborator

pub mod client;
pub mod conn;
pub mod protocol;
pub mod rest;

pub use client::{ChannelClient, ChannelConfig, ChannelError, ChannelHandle};
pub use conn::{ConnAction, ConnEvent, ConnMachine, ConnState};
pub use protocol::{ChannelEvent, Directive, EventKind, Frame, Inbound, ProtocolError};
pub use rest::HttpRemote;
