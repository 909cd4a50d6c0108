//! Execution bridge: spawn, track, notify.

use std::{
    process::Stdio,
    sync::{Arc, Mutex},
    time::Duration,
};

use obsh_core::{Chunks, HistoryStore, Notifier, Outcome};
use thiserror::Error;
use tokio::{
    process::{Child, Command},
    sync::oneshot,
};

/// Grace period between the catchable signal and a hard kill.
const TERM_GRACE: Duration = Duration::from_secs(5);

use crate::shell::shell_command;

/// Bridge error.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("No history entry to annotate")]
    NoHistory,
}

/// One execution, alive from spawn to exit.
///
/// `outcome` is `None` while the process runs and is used afterward only
/// to decorate the next prompt.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    /// Single-line executable form of the input.
    pub command: String,
    /// Result, set once the process exits (or fails to spawn).
    pub outcome: Option<Outcome>,
}

/// Runs one logical input against the local shell.
///
/// The caller must have released the terminal before `execute` so the
/// spawned process can own it; the bridge itself never touches the
/// line-editing surface.
pub struct ExecutionBridge {
    notifier: Arc<dyn Notifier>,
    history: Arc<HistoryStore>,
    active: Arc<Mutex<Option<oneshot::Sender<i32>>>>,
}

impl ExecutionBridge {
    /// Create a bridge over the shared history and a notifier.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, history: Arc<HistoryStore>) -> Self {
        Self {
            notifier,
            history,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether a spawned process is currently attached to the terminal.
    #[must_use]
    pub fn has_active(&self) -> bool {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Attach a comment to the most recent history entry.
    ///
    /// Sends a `comment` notification; delivery failure is a warning,
    /// never fatal. When the entry's remote id has not arrived yet the
    /// comment is skipped with a warning.
    ///
    /// # Errors
    /// Returns [`BridgeError::NoHistory`] when nothing has been executed.
    pub async fn annotate(&self, comment: &str) -> Result<(), BridgeError> {
        let last = self.history.last().ok_or(BridgeError::NoHistory)?;
        let Some(id) = last.id else {
            tracing::warn!("last entry has no remote id yet; comment skipped");
            return Ok(());
        };
        if let Err(e) = self.notifier.annotate(&id, comment).await {
            tracing::warn!("comment delivery failed: {e}");
        }
        Ok(())
    }

    /// Execute one logical submission and await its exit.
    ///
    /// The raw transcript is reported to the notifier as a detached task;
    /// its acknowledgement assigns the most recent history entry's id
    /// whenever it resolves, unordered relative to process exit, and a
    /// failure never stalls the session. Spawn failure and non-zero exit
    /// both map to [`Outcome::Failed`] without being a session error.
    pub async fn execute(&self, chunks: &Chunks) -> ExecutionRecord {
        self.run(chunks, true).await
    }

    /// Execute without reporting the input to the notifier.
    ///
    /// Used for remote-originated inputs, which the remote side already
    /// holds a record of.
    pub async fn execute_silent(&self, chunks: &Chunks) -> ExecutionRecord {
        self.run(chunks, false).await
    }

    async fn run(&self, chunks: &Chunks, notify: bool) -> ExecutionRecord {
        let command = chunks.command();

        if notify {
            let transcript = chunks.transcript();
            let notifier = Arc::clone(&self.notifier);
            let history = Arc::clone(&self.history);
            tokio::spawn(async move {
                match notifier.notify_input(&transcript).await {
                    Ok(ack) => {
                        tracing::debug!(id = %ack.id, channel = %ack.channel, "input recorded");
                        if let Err(e) = history.set_last_id(ack.id) {
                            tracing::warn!("acknowledgement with no history entry: {e}");
                        }
                    }
                    Err(e) => tracing::warn!("input notification failed: {e}"),
                }
            });
        }

        let (shell, flag) = shell_command();
        let mut child = match Command::new(shell)
            .arg(flag)
            .arg(&command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(%command, "spawn failed: {e}");
                return ExecutionRecord {
                    command,
                    outcome: Some(Outcome::Failed),
                };
            }
        };

        let (kill_tx, kill_rx) = oneshot::channel::<i32>();
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(kill_tx);

        let outcome = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => Outcome::from_status(status),
                Err(e) => {
                    tracing::warn!("wait failed: {e}");
                    Outcome::Failed
                }
            },
            code = kill_rx => {
                let code = code.unwrap_or_default();
                tracing::info!(code, "terminating active process");
                terminate(&mut child, code).await;
                Outcome::Failed
            }
        };

        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        ExecutionRecord {
            command,
            outcome: Some(outcome),
        }
    }

    /// Signal the active process with a termination code.
    ///
    /// On Unix the code is delivered as a catchable signal (`SIGINT`
    /// for 130, `SIGTERM` otherwise) with a grace period before a hard
    /// kill. Returns whether a process was signalled; teardown must not
    /// exit the program in the call that signalled one.
    pub fn kill_active(&self, code: i32) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some_and(|tx| tx.send(code).is_ok())
    }
}

/// Deliver the termination code as a catchable signal, escalating to a
/// hard kill when the process ignores it.
async fn terminate(child: &mut Child, code: i32) {
    if signal_child(child, code) {
        if tokio::time::timeout(TERM_GRACE, child.wait()).await.is_ok() {
            return;
        }
        tracing::warn!("process ignored termination signal");
    }
    if let Err(e) = child.kill().await {
        tracing::warn!("kill failed: {e}");
    }
}

// 130 is the conventional interrupt exit code; anything else is an
// ordinary termination request.
#[cfg(unix)]
#[allow(unsafe_code, clippy::cast_possible_wrap)]
fn signal_child(child: &Child, code: i32) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    let signal = if code == 130 { libc::SIGINT } else { libc::SIGTERM };
    unsafe { libc::kill(pid as i32, signal) == 0 }
}

#[cfg(not(unix))]
fn signal_child(_child: &Child, _code: i32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use obsh_core::{MessageAck, NotifyError};
    use std::time::Duration;

    struct FakeNotifier {
        ack_id: Option<String>,
        comments: Mutex<Vec<(String, String)>>,
    }

    impl FakeNotifier {
        fn acking(id: &str) -> Arc<Self> {
            Arc::new(Self {
                ack_id: Some(id.to_string()),
                comments: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                ack_id: None,
                comments: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify_input(&self, _input: &str) -> Result<MessageAck, NotifyError> {
            match &self.ack_id {
                Some(id) => Ok(MessageAck {
                    id: id.clone(),
                    channel: "c1".to_string(),
                }),
                None => Err(NotifyError::Delivery("down".to_string())),
            }
        }

        async fn annotate(&self, id: &str, comment: &str) -> Result<(), NotifyError> {
            self.comments
                .lock()
                .unwrap()
                .push((id.to_string(), comment.to_string()));
            Ok(())
        }
    }

    async fn wait_for_id(history: &HistoryStore) -> Option<String> {
        for _ in 0..100 {
            if let Some(entry) = history.last() {
                if entry.id.is_some() {
                    return entry.id;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_succeeds_and_ack_sets_last_id() {
        let history = Arc::new(HistoryStore::new());
        let bridge = ExecutionBridge::new(FakeNotifier::acking("42"), Arc::clone(&history));

        history.append("echo hi");
        let chunks = Chunks::new(vec!["true".to_string()]);
        let record = bridge.execute(&chunks).await;

        assert_eq!(record.outcome, Some(Outcome::Succeeded));
        assert_eq!(wait_for_id(&history).await.as_deref(), Some("42"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_fails_without_session_error() {
        let history = Arc::new(HistoryStore::new());
        let bridge = ExecutionBridge::new(FakeNotifier::acking("1"), Arc::clone(&history));

        history.append("false");
        let record = bridge
            .execute(&Chunks::new(vec!["false".to_string()]))
            .await;
        assert_eq!(record.outcome, Some(Outcome::Failed));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn notification_failure_does_not_affect_outcome() {
        let history = Arc::new(HistoryStore::new());
        let bridge = ExecutionBridge::new(FakeNotifier::failing(), Arc::clone(&history));

        history.append("true");
        let record = bridge.execute(&Chunks::new(vec!["true".to_string()])).await;

        assert_eq!(record.outcome, Some(Outcome::Succeeded));
        assert_eq!(history.last().unwrap().id, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_execution_never_notifies() {
        let history = Arc::new(HistoryStore::new());
        let bridge = ExecutionBridge::new(FakeNotifier::acking("42"), Arc::clone(&history));

        history.append("true");
        let record = bridge
            .execute_silent(&Chunks::new(vec!["true".to_string()]))
            .await;

        assert_eq!(record.outcome, Some(Outcome::Succeeded));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(history.last().unwrap().id, None);
    }

    #[tokio::test]
    async fn annotate_on_empty_history_fails() {
        let history = Arc::new(HistoryStore::new());
        let bridge = ExecutionBridge::new(FakeNotifier::acking("1"), history);
        assert!(matches!(
            bridge.annotate("note").await,
            Err(BridgeError::NoHistory)
        ));
    }

    #[tokio::test]
    async fn annotate_sends_comment_for_acked_entry() {
        let history = Arc::new(HistoryStore::new());
        let notifier = FakeNotifier::acking("42");
        let bridge = ExecutionBridge::new(Arc::clone(&notifier) as Arc<dyn Notifier>, Arc::clone(&history));

        history.append("echo hi");
        history.set_last_id("42").unwrap();
        bridge.annotate("worked").await.unwrap();

        let comments = notifier.comments.lock().unwrap();
        assert_eq!(comments.as_slice(), &[("42".to_string(), "worked".to_string())]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kill_active_terminates_a_running_process() {
        let history = Arc::new(HistoryStore::new());
        let bridge = Arc::new(ExecutionBridge::new(
            FakeNotifier::acking("1"),
            Arc::clone(&history),
        ));

        history.append("sleep 30");
        let runner = Arc::clone(&bridge);
        let task = tokio::spawn(async move {
            runner
                .execute(&Chunks::new(vec!["sleep 30".to_string()]))
                .await
        });

        // Give the spawn a moment, then signal.
        for _ in 0..100 {
            if bridge.has_active() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(bridge.kill_active(0));

        let record = task.await.unwrap();
        assert_eq!(record.outcome, Some(Outcome::Failed));
        assert!(!bridge.has_active());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn termination_signal_is_catchable_by_the_child() {
        let marker = std::env::temp_dir().join(format!("obsh-term-{}", std::process::id()));
        let ready = std::env::temp_dir().join(format!("obsh-ready-{}", std::process::id()));
        let _ = std::fs::remove_file(&marker);
        let _ = std::fs::remove_file(&ready);
        // The trap only runs if the child gets a catchable signal, not
        // a hard kill; the ready file proves the trap is installed
        // before we signal.
        let script = format!(
            "trap 'touch {}' TERM INT; touch {}; sleep 30 & wait",
            marker.display(),
            ready.display()
        );

        let history = Arc::new(HistoryStore::new());
        let bridge = Arc::new(ExecutionBridge::new(
            FakeNotifier::acking("1"),
            Arc::clone(&history),
        ));

        let runner = Arc::clone(&bridge);
        let chunks = Chunks::new(vec![script]);
        let task = tokio::spawn(async move { runner.execute_silent(&chunks).await });
        for _ in 0..200 {
            if ready.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(ready.exists(), "child never started");
        assert!(bridge.kill_active(0));

        let record = task.await.unwrap();
        assert_eq!(record.outcome, Some(Outcome::Failed));
        for _ in 0..100 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(marker.exists(), "child never saw the termination signal");
        let _ = std::fs::remove_file(&marker);
        let _ = std::fs::remove_file(&ready);
    }

    #[tokio::test]
    async fn kill_active_without_process_is_false() {
        let history = Arc::new(HistoryStore::new());
        let bridge = ExecutionBridge::new(FakeNotifier::acking("1"), history);
        assert!(!bridge.kill_active(0));
    }
}
