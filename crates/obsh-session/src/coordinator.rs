//! The session run loop.

use std::sync::Arc;

use obsh_channel::{ChannelClient, ChannelEvent, Directive, EventKind};
use obsh_core::{Chunks, HistoryStore, MessageFetch, Outcome};
use obsh_executor::{ExecutionBridge, ExecutionRecord, InputClass, classify};
use obsh_prompt::{PromptError, Submission, SubmissionSource};
use thiserror::Error;
use tokio::sync::mpsc;

/// Exit code used when the session is torn down by an interrupt.
const INTERRUPT_CODE: i32 = 130;

/// Fatal session error.
///
/// Almost nothing in the session is fatal: process failures, delivery
/// failures and channel outages are rendered and survived. Losing the
/// terminal itself is not.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Prompt failure: {0}")]
    Prompt(#[from] PromptError),
}

/// Owns the run loop and serializes everything that competes for the
/// terminal.
///
/// At most one of the following is in flight at any point: a prompt
/// read, a spawned process, or a remote-triggered execution. Remote
/// events that arrive while a process runs stay queued and are surfaced
/// before the prompt is re-entered.
pub struct SessionCoordinator<P: SubmissionSource> {
    prompt: P,
    bridge: Arc<ExecutionBridge>,
    history: Arc<HistoryStore>,
    fetcher: Arc<dyn MessageFetch>,
    channel: Option<(ChannelClient, String)>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl<P: SubmissionSource> SessionCoordinator<P> {
    /// Build a coordinator without a push channel; [`Self::attach_channel`]
    /// adds one.
    #[must_use]
    pub fn new(
        prompt: P,
        bridge: Arc<ExecutionBridge>,
        history: Arc<HistoryStore>,
        fetcher: Arc<dyn MessageFetch>,
    ) -> Self {
        // With no channel attached every sender is dropped immediately,
        // which permanently disables the remote arm of the run loop.
        let (_, events) = mpsc::unbounded_channel();
        Self {
            prompt,
            bridge,
            history,
            fetcher,
            channel: None,
            events,
        }
    }

    /// Wire a connected channel client into the loop.
    ///
    /// Subscribes to message events, funnels them into the run loop, and
    /// announces the session onto `channel` each time the connection
    /// becomes ready (initial connect and every reconnect).
    pub fn attach_channel(&mut self, client: ChannelClient, channel: &str) {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in [EventKind::Message, EventKind::MessageDeleted] {
            let mut sub = client.subscribe(kind);
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(event) = sub.recv().await {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            });
        }

        let handle = client.handle();
        let name = channel.to_string();
        client.on_ready(move || handle.send(Directive::Focus(name.clone())));

        self.events = rx;
        self.channel = Some((client, channel.to_string()));
    }

    /// Run the session until teardown; returns the exit code.
    ///
    /// # Errors
    /// Only on unrecoverable terminal failure.
    pub async fn run(mut self) -> Result<i32, SessionError> {
        let mut decoration: Option<Outcome> = None;
        loop {
            self.prompt.set_prompt(prompt_text(decoration).to_string());

            let submission = tokio::select! {
                biased;
                Some(event) = self.events.recv() => {
                    if let Some(outcome) = self.handle_remote(event).await {
                        decoration = Some(outcome);
                    }
                    continue;
                }
                submission = self.prompt.read_submission() => submission?,
            };

            match submission {
                Submission::Cancelled => continue,
                Submission::Eof => match self.request_quit(0).await? {
                    Some(code) => return Ok(code),
                    None => continue,
                },
                Submission::Lines(chunks) => {
                    if chunks.is_blank() {
                        continue;
                    }
                    match classify(&chunks.command()) {
                        InputClass::Quit => match self.request_quit(0).await? {
                            Some(code) => return Ok(code),
                            None => continue,
                        },
                        InputClass::Annotation(comment) => {
                            if let Err(e) = self.bridge.annotate(&comment).await {
                                println!("{e}");
                            }
                        }
                        InputClass::Executable => {
                            let command = chunks.command();
                            if !self.prompt.options().is_excluded(&command) {
                                self.history.append(&command);
                            }
                            match self.execute(chunks, true).await {
                                Ok(record) => decoration = record.outcome,
                                Err(code) => return self.finish(code).await,
                            }
                        }
                    }
                }
            }
        }
    }

    /// Run one submission, local or remote, keeping the terminal free
    /// for the child.
    ///
    /// An interrupt while the process runs signals it and resolves to
    /// `Err(code)`, which tears the session down.
    async fn execute(&self, chunks: Chunks, notify: bool) -> Result<ExecutionRecord, i32> {
        let bridge = Arc::clone(&self.bridge);
        let mut task = tokio::spawn(async move {
            if notify {
                bridge.execute(&chunks).await
            } else {
                bridge.execute_silent(&chunks).await
            }
        });

        tokio::select! {
            record = &mut task => Ok(record.unwrap_or_else(|e| {
                tracing::warn!("execution task failed: {e}");
                ExecutionRecord {
                    command: String::new(),
                    outcome: Some(Outcome::Failed),
                }
            })),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted while a process was running");
                self.bridge.kill_active(INTERRUPT_CODE);
                let _ = task.await;
                Err(INTERRUPT_CODE)
            }
        }
    }

    /// Fetch, record, render and run one remote event.
    ///
    /// Returns the outcome when the event led to an execution. Fetch
    /// failures and deletion notices are logged and skipped; the remote
    /// side must never be able to take the session down.
    async fn handle_remote(&self, event: ChannelEvent) -> Option<Outcome> {
        match event {
            ChannelEvent::Message { id } => {
                let message = match self.fetcher.fetch(&id).await {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(%id, "remote message fetch failed: {e}");
                        return None;
                    }
                };

                self.history.append(&message.input);
                match &message.meta {
                    Some(meta) => println!("[remote] {} ({meta})", message.input),
                    None => println!("[remote] {}", message.input),
                }

                let chunks = Chunks::new(message.input.lines().map(str::to_string).collect());
                match self.execute(chunks, false).await {
                    Ok(record) => record.outcome,
                    Err(_) => None,
                }
            }
            ChannelEvent::MessageDeleted { id } => {
                tracing::info!(%id, "remote message deleted");
                None
            }
        }
    }

    /// Handle an explicit quit.
    ///
    /// When a process is still active the quit only signals it and the
    /// session stays up; `None` means keep looping.
    async fn request_quit(&mut self, code: i32) -> Result<Option<i32>, SessionError> {
        if self.bridge.kill_active(code) {
            tracing::info!("termination signal sent to active process");
            return Ok(None);
        }
        self.finish(code).await.map(Some)
    }

    async fn finish(&mut self, code: i32) -> Result<i32, SessionError> {
        self.prompt.close();
        if let Some((client, channel)) = self.channel.take() {
            client.send(Directive::Blur(channel));
            client.shutdown().await;
        }
        println!("Disconnected.");
        Ok(code)
    }
}

/// Prompt text for the next read, decorated by the previous outcome.
fn prompt_text(outcome: Option<Outcome>) -> &'static str {
    match outcome {
        Some(Outcome::Failed) => "! ",
        _ => "$ ",
    }
}
