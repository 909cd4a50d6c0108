//! HTTP notification and message-fetch collaborator.
//!
//! Posts `{type, payload}` records to a configured endpoint and fetches
//! message content by id. Failures here are reported as warnings by the
//! callers and never stall the session.

use async_trait::async_trait;
use obsh_core::{MessageAck, MessageFetch, Notifier, NotifyError, RemoteMessage};
use serde::Serialize;
use serde_json::json;
use url::Url;

use crate::client::ChannelError;

#[derive(Serialize)]
struct Record<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    payload: serde_json::Value,
}

/// Remote API client over HTTP.
pub struct HttpRemote {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpRemote {
    /// Create a client for a notification endpoint.
    ///
    /// # Errors
    /// Returns [`ChannelError::InvalidUrl`] for a malformed endpoint.
    pub fn new<S: Into<String>>(endpoint: S) -> Result<Self, ChannelError> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint).map_err(|e| ChannelError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, record: &Record<'_>) -> Result<reqwest::Response, NotifyError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl Notifier for HttpRemote {
    async fn notify_input(&self, input: &str) -> Result<MessageAck, NotifyError> {
        let record = Record {
            kind: "message",
            payload: json!({ "input": input }),
        };
        self.post(&record)
            .await?
            .json::<MessageAck>()
            .await
            .map_err(|e| NotifyError::BadResponse(e.to_string()))
    }

    async fn annotate(&self, id: &str, comment: &str) -> Result<(), NotifyError> {
        let record = Record {
            kind: "comment",
            payload: json!({ "id": id, "comment": comment }),
        };
        self.post(&record).await?;
        Ok(())
    }
}

#[async_trait]
impl MessageFetch for HttpRemote {
    async fn fetch(&self, id: &str) -> Result<RemoteMessage, NotifyError> {
        let url = format!("{}/{id}", self.endpoint);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        response
            .json::<RemoteMessage>()
            .await
            .map_err(|e| NotifyError::BadResponse(e.to_string()))
    }
}
