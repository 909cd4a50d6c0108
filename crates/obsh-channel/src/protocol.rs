//! Wire protocol for the push channel.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// One wire message: JSON text frame `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Message type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload.
    #[serde(default)]
    pub data: Value,
}

/// Protocol error.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown message type: {0}")]
    UnknownType(String),
    #[error("Bad payload for '{kind}': {source}")]
    BadPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Inbound event kinds the client dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// New remote message content is available.
    Message,
    /// A previously delivered message was deleted.
    MessageDeleted,
}

impl EventKind {
    /// The wire `type` string.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::MessageDeleted => "message:delete",
        }
    }

    fn from_wire(name: &str) -> Option<Self> {
        match name {
            "message" => Some(Self::Message),
            "message:delete" => Some(Self::MessageDeleted),
            _ => None,
        }
    }
}

/// Typed inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Remote message reference; content is fetched separately.
    Message { id: String },
    /// Remote message deletion notice.
    MessageDeleted { id: String },
}

impl ChannelEvent {
    /// Dispatch kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Message { .. } => EventKind::Message,
            Self::MessageDeleted { .. } => EventKind::MessageDeleted,
        }
    }
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

/// Outbound channel-scoping directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Scope the session onto a channel.
    Focus(String),
    /// Release the channel scope.
    Blur(String),
}

impl Directive {
    /// Render as a wire frame.
    #[must_use]
    pub fn into_frame(self) -> Frame {
        let (kind, channel) = match self {
            Self::Focus(channel) => ("channel:focus", channel),
            Self::Blur(channel) => ("channel:blur", channel),
        };
        Frame {
            kind: kind.to_string(),
            data: json!({ "channel": channel }),
        }
    }
}

/// Result of parsing one inbound text frame.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A recognized, typed event.
    Event(ChannelEvent),
    /// Text that is not a well-formed frame; passed through, never an error.
    Raw(String),
}

/// Parse one inbound text frame.
///
/// Unparsable text becomes [`Inbound::Raw`]. A well-formed frame with an
/// unknown `type` is rejected explicitly.
///
/// # Errors
/// Returns [`ProtocolError::UnknownType`] for unregistered types and
/// [`ProtocolError::BadPayload`] when a known type carries bad data.
pub fn parse_inbound(text: &str) -> Result<Inbound, ProtocolError> {
    let Ok(frame) = serde_json::from_str::<Frame>(text) else {
        return Ok(Inbound::Raw(text.to_string()));
    };

    let Some(kind) = EventKind::from_wire(&frame.kind) else {
        return Err(ProtocolError::UnknownType(frame.kind));
    };

    let payload: IdPayload =
        serde_json::from_value(frame.data).map_err(|source| ProtocolError::BadPayload {
            kind: frame.kind,
            source,
        })?;

    let event = match kind {
        EventKind::Message => ChannelEvent::Message { id: payload.id },
        EventKind::MessageDeleted => ChannelEvent::MessageDeleted { id: payload.id },
    };
    Ok(Inbound::Event(event))
}
