//! WebSocket channel client.
//!
//! Drives [`ConnMachine`] over a tokio-tungstenite transport: liveness
//! deadline reset on any inbound signal, fixed-backoff indefinite
//! reconnect, typed dispatch to subscribers, ready-callbacks refired on
//! every (re)connection.

use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep, sleep_until},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use url::Url;

use crate::conn::{ConnAction, ConnEvent, ConnMachine, ConnState};
use crate::protocol::{ChannelEvent, Directive, EventKind, Inbound, parse_inbound};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ReadyCallback = Arc<dyn Fn() + Send + Sync>;

/// Channel client error.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid channel URL: {0}")]
    InvalidUrl(String),
}

/// Channel client configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Expected interval between inbound keep-alive signals.
    pub heartbeat_interval: Duration,
    /// Slack added to the interval before the connection is declared dead.
    pub heartbeat_grace: Duration,
    /// Fixed delay between a close and the next connection attempt.
    pub reconnect_backoff: Duration,
}

impl ChannelConfig {
    /// Configuration with source-behavior defaults.
    #[must_use]
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            heartbeat_interval: Duration::from_secs(25),
            heartbeat_grace: Duration::from_secs(2),
            reconnect_backoff: Duration::from_secs(2),
        }
    }
}

enum Command {
    Subscribe(EventKind, mpsc::UnboundedSender<ChannelEvent>),
    OnReady(ReadyCallback),
    Send(Directive),
    Shutdown,
}

/// Cloneable outbound handle, usable from ready-callbacks.
#[derive(Clone)]
pub struct ChannelHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl ChannelHandle {
    /// Send an outbound directive; dropped silently when not open.
    pub fn send(&self, directive: Directive) {
        if self.cmd_tx.send(Command::Send(directive)).is_err() {
            tracing::debug!("channel driver gone; directive dropped");
        }
    }
}

/// Handle to a long-lived channel connection.
///
/// Subscriptions and ready-callbacks belong to the client, not to any
/// single connection instance: they survive reconnects. Outbound sends
/// are dropped silently while the connection is not open; there is no
/// outbound queueing across a reconnect.
pub struct ChannelClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl ChannelClient {
    /// Validate the endpoint and start the connection driver.
    ///
    /// The driver reconnects indefinitely with a fixed backoff; only
    /// [`shutdown`](Self::shutdown) stops it.
    ///
    /// # Errors
    /// Returns [`ChannelError::InvalidUrl`] for a malformed or
    /// non-WebSocket URL.
    pub fn connect(config: ChannelConfig) -> Result<Self, ChannelError> {
        let url = Url::parse(&config.url).map_err(|e| ChannelError::InvalidUrl(e.to_string()))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ChannelError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                url.scheme()
            )));
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            config,
            machine: ConnMachine::new(),
            subs: HashMap::new(),
            ready: Vec::new(),
            cmd_rx,
        };
        let task = tokio::spawn(driver.run());
        Ok(Self { cmd_tx, task })
    }

    /// Register a subscriber for one event kind.
    ///
    /// Delivery to multiple subscribers of the same kind follows
    /// registration order. Each subscriber gets its own unbounded queue,
    /// so a slow consumer never blocks the transport read loop while its
    /// own events stay ordered.
    #[must_use]
    pub fn subscribe(&self, kind: EventKind) -> mpsc::UnboundedReceiver<ChannelEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.cmd_tx.send(Command::Subscribe(kind, tx));
        rx
    }

    /// Register a callback fired on every (re)connection.
    ///
    /// Callers needing once-only semantics must self-guard.
    pub fn on_ready<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let _ = self.cmd_tx.send(Command::OnReady(Arc::new(callback)));
    }

    /// Send an outbound directive; dropped silently when not open.
    pub fn send(&self, directive: Directive) {
        if self.cmd_tx.send(Command::Send(directive)).is_err() {
            tracing::debug!("channel driver gone; directive dropped");
        }
    }

    /// Outbound handle decoupled from the client's lifetime.
    #[must_use]
    pub fn handle(&self) -> ChannelHandle {
        ChannelHandle {
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Stop the driver, closing any open transport on the way out.
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        let _ = self.task.await;
    }
}

struct Driver {
    config: ChannelConfig,
    machine: ConnMachine,
    subs: HashMap<EventKind, Vec<mpsc::UnboundedSender<ChannelEvent>>>,
    ready: Vec<ReadyCallback>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

impl Driver {
    async fn run(mut self) {
        while !self.machine.is_shutting_down() {
            match self.machine.state() {
                ConnState::Connecting => {
                    if let Some(ws) = self.connecting_phase().await {
                        self.open_phase(ws).await;
                    }
                }
                ConnState::Closed => self.backoff_phase().await,
                // Open is entered and left inside open_phase only.
                ConnState::Open => break,
            }
        }
        tracing::debug!("channel driver stopped");
    }

    async fn connecting_phase(&mut self) -> Option<WsStream> {
        tracing::debug!(url = %self.config.url, "connecting");
        let connect = connect_async(self.config.url.clone());
        tokio::pin!(connect);

        loop {
            tokio::select! {
                res = &mut connect => {
                    return match res {
                        Ok((ws, _)) => {
                            tracing::info!(url = %self.config.url, "channel open");
                            for action in self.machine.on_event(ConnEvent::Opened) {
                                if action == ConnAction::FireReady {
                                    self.fire_ready();
                                }
                            }
                            Some(ws)
                        }
                        Err(e) => {
                            tracing::warn!(url = %self.config.url, "connect failed: {e}");
                            self.machine.on_event(ConnEvent::TransportClosed);
                            None
                        }
                    };
                }
                cmd = self.cmd_rx.recv() => {
                    if self.handle_idle_command(cmd) {
                        self.machine.on_event(ConnEvent::ShutdownRequested);
                        return None;
                    }
                }
            }
        }
    }

    async fn open_phase(&mut self, ws: WsStream) {
        let (mut sink, mut stream) = ws.split();
        let liveness = self.config.heartbeat_interval + self.config.heartbeat_grace;
        let mut deadline = Instant::now() + liveness;

        loop {
            tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => match cmd {
                    None | Some(Command::Shutdown) => {
                        for action in self.machine.on_event(ConnEvent::ShutdownRequested) {
                            if action == ConnAction::CloseTransport {
                                let _ = sink.send(Message::Close(None)).await;
                            }
                        }
                        return;
                    }
                    Some(Command::Subscribe(kind, tx)) => {
                        self.subs.entry(kind).or_default().push(tx);
                    }
                    Some(Command::OnReady(callback)) => {
                        // Already open: fire now, refire on later reconnects.
                        callback();
                        self.ready.push(callback);
                    }
                    Some(Command::Send(directive)) => {
                        let frame = directive.into_frame();
                        match serde_json::to_string(&frame) {
                            Ok(text) => {
                                if let Err(e) = sink.send(Message::Text(text.into())).await {
                                    tracing::warn!("outbound send failed: {e}");
                                    self.machine.on_event(ConnEvent::TransportClosed);
                                    return;
                                }
                            }
                            Err(e) => tracing::error!("failed to serialize frame: {e}"),
                        }
                    }
                },
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        self.machine.on_event(ConnEvent::FrameReceived);
                        deadline = Instant::now() + liveness;
                        self.dispatch(text.as_str());
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Protocol keep-alives count as liveness too.
                        self.machine.on_event(ConnEvent::FrameReceived);
                        deadline = Instant::now() + liveness;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("channel closed by remote");
                        self.machine.on_event(ConnEvent::TransportClosed);
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("transport error: {e}");
                        self.machine.on_event(ConnEvent::TransportClosed);
                        return;
                    }
                },
                () = sleep_until(deadline) => {
                    tracing::warn!("liveness deadline expired, terminating connection");
                    for action in self.machine.on_event(ConnEvent::DeadlineExpired) {
                        if action == ConnAction::CloseTransport {
                            let _ = sink.send(Message::Close(None)).await;
                        }
                    }
                    return;
                }
            }
        }
    }

    async fn backoff_phase(&mut self) {
        let backoff = sleep(self.config.reconnect_backoff);
        tokio::pin!(backoff);

        loop {
            tokio::select! {
                () = &mut backoff => {
                    self.machine.on_event(ConnEvent::ReconnectDue);
                    return;
                }
                cmd = self.cmd_rx.recv() => {
                    if self.handle_idle_command(cmd) {
                        self.machine.on_event(ConnEvent::ShutdownRequested);
                        return;
                    }
                }
            }
        }
    }

    /// Handle a command while no transport is open. Returns true on shutdown.
    fn handle_idle_command(&mut self, cmd: Option<Command>) -> bool {
        match cmd {
            None | Some(Command::Shutdown) => true,
            Some(Command::Subscribe(kind, tx)) => {
                self.subs.entry(kind).or_default().push(tx);
                false
            }
            Some(Command::OnReady(callback)) => {
                // Queued until the connection is established.
                self.ready.push(callback);
                false
            }
            Some(Command::Send(directive)) => {
                tracing::debug!(?directive, "not open; directive dropped");
                false
            }
        }
    }

    fn fire_ready(&self) {
        for callback in &self.ready {
            callback();
        }
    }

    fn dispatch(&mut self, text: &str) {
        match parse_inbound(text) {
            Ok(Inbound::Event(event)) => {
                if let Some(subscribers) = self.subs.get_mut(&event.kind()) {
                    // Registration order; drop subscribers that went away.
                    subscribers.retain(|tx| tx.send(event.clone()).is_ok());
                }
            }
            Ok(Inbound::Raw(raw)) => {
                tracing::debug!(frame = %raw, "unparsable frame passed through");
            }
            Err(e) => tracing::warn!("rejected inbound frame: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_source_behavior() {
        let config = ChannelConfig::new("ws://localhost:9000/ws");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(25));
        assert_eq!(config.heartbeat_grace, Duration::from_secs(2));
        assert_eq!(config.reconnect_backoff, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn invalid_url_scheme_is_rejected() {
        let result = ChannelClient::connect(ChannelConfig::new("https://example.com"));
        assert!(matches!(result, Err(ChannelError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn malformed_url_is_rejected() {
        let result = ChannelClient::connect(ChannelConfig::new("not a url"));
        assert!(matches!(result, Err(ChannelError::InvalidUrl(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_elapses_then_reconnects() {
        let (_cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let mut driver = Driver {
            config: ChannelConfig::new("ws://127.0.0.1:1/ws"),
            machine: ConnMachine::new(),
            subs: HashMap::new(),
            ready: Vec::new(),
            cmd_rx,
        };
        driver.machine.on_event(ConnEvent::TransportClosed);
        assert_eq!(driver.machine.state(), ConnState::Closed);

        driver.backoff_phase().await;
        assert_eq!(driver.machine.state(), ConnState::Connecting);
    }

    #[tokio::test]
    async fn shutdown_stops_the_driver() {
        // Connects nowhere; shutdown must still terminate the task.
        let client = ChannelClient::connect(ChannelConfig::new("ws://127.0.0.1:1/ws")).unwrap();
        client.shutdown().await;
    }
}
