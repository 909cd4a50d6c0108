//! Traits for the remote collaborators.

use std::process::ExitStatus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of one command execution, used only to decorate the next prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Process exited with code zero.
    Succeeded,
    /// Process failed to spawn or exited non-zero.
    Failed,
}

impl Outcome {
    /// Map an exit status onto an outcome.
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            Self::Succeeded
        } else {
            Self::Failed
        }
    }
}

/// Acknowledgement returned by a successful input notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAck {
    /// Remote identifier assigned to the input.
    pub id: String,
    /// Channel the input was recorded under.
    pub channel: String,
}

/// A remote-authored message referenced by an inbound channel event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMessage {
    /// Remote identifier.
    pub id: String,
    /// Command text to surface locally.
    pub input: String,
    /// Optional annotation attached remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

/// Notification error.
///
/// Never fatal to the session: callers log a warning and continue.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("Unexpected response: {0}")]
    BadResponse(String),
}

/// Outbound notification collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Record an executed input remotely; returns the assigned id.
    async fn notify_input(&self, input: &str) -> Result<MessageAck, NotifyError>;

    /// Attach a comment to a previously recorded input.
    async fn annotate(&self, id: &str, comment: &str) -> Result<(), NotifyError>;
}

/// Message-fetch collaborator.
#[async_trait]
pub trait MessageFetch: Send + Sync {
    /// Fetch the message content for an inbound event's id.
    async fn fetch(&self, id: &str) -> Result<RemoteMessage, NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_message_meta_is_optional() {
        let msg: RemoteMessage =
            serde_json::from_str(r#"{"id":"7","input":"echo hi"}"#).unwrap();
        assert_eq!(msg.id, "7");
        assert!(msg.meta.is_none());

        let msg: RemoteMessage =
            serde_json::from_str(r#"{"id":"7","input":"echo hi","meta":"note"}"#).unwrap();
        assert_eq!(msg.meta.as_deref(), Some("note"));
    }

    #[test]
    fn ack_roundtrip() {
        let ack = MessageAck {
            id: "42".into(),
            channel: "c1".into(),
        };
        let json = serde_json::to_string(&ack).unwrap();
        let parsed: MessageAck = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "42");
        assert_eq!(parsed.channel, "c1");
    }
}
