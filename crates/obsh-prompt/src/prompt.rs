//! Raw-mode line editor producing logical submissions.

use std::{
    io::{self, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::Print,
    terminal::{Clear, ClearType, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use obsh_core::{Chunks, HistoryStore};
use regex::Regex;
use thiserror::Error;

use crate::recall::RecallCursor;
use crate::submission::{LineOutcome, SubmissionBuilder};

/// Prompt error.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A second read was requested while one is outstanding.
    /// Programming error: callers must consume each result first.
    #[error("A prompt read is already outstanding")]
    ReadInProgress,
}

/// Result of one prompt read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Finalized chunk sequence of one logical submission.
    Lines(Chunks),
    /// Local interrupt: explicitly no submission, session continues.
    Cancelled,
    /// End of input (Ctrl+D on an empty line, or stream end).
    Eof,
}

/// Prompt configuration.
#[derive(Debug, Clone)]
pub struct PromptOptions {
    /// Leading prompt string for the first line.
    pub prompt: String,
    /// Prompt string for continuation lines.
    pub continuation_prompt: String,
    /// Suppress echo and recall.
    pub secure: bool,
    /// Inputs matching any of these are accepted but must not be
    /// written to history by the caller.
    pub exclusions: Vec<Regex>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            prompt: "$ ".to_string(),
            continuation_prompt: "> ".to_string(),
            secure: false,
            exclusions: Vec::new(),
        }
    }
}

impl PromptOptions {
    /// Whether an input matches an exclusion pattern.
    #[must_use]
    pub fn is_excluded(&self, input: &str) -> bool {
        self.exclusions.iter().any(|re| re.is_match(input))
    }
}

/// Releases raw mode on every exit path.
///
/// The guard is the terminal-ownership token: while it is alive the
/// line editor owns standard input, and no child process may inherit
/// the terminal. Dropping it hands the terminal back.
struct RawModeGuard;

impl RawModeGuard {
    fn acquire() -> Result<Self, PromptError> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Clears the outstanding-read flag when the read future ends or is dropped.
struct ReadToken {
    flag: Arc<AtomicBool>,
}

impl ReadToken {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, PromptError> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PromptError::ReadInProgress);
        }
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for ReadToken {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Source of logical submissions.
///
/// The seam between the session loop and the terminal; the live
/// implementation is [`LinePrompt`].
#[async_trait]
pub trait SubmissionSource: Send {
    /// Read one logical submission.
    async fn read_submission(&mut self) -> Result<Submission, PromptError>;

    /// Replace the first-line prompt string.
    fn set_prompt(&mut self, prompt: String);

    /// Prompt configuration.
    fn options(&self) -> &PromptOptions;

    /// Release the line-editing surface.
    fn close(&mut self);
}

/// Line editor bound to a shared history store.
///
/// One read is outstanding at a time; the read future is cancel-safe
/// (dropping it releases the terminal and discards partial input).
pub struct LinePrompt {
    options: PromptOptions,
    history: Arc<HistoryStore>,
    reading: Arc<AtomicBool>,
}

impl LinePrompt {
    /// Create a prompt over a shared history store.
    #[must_use]
    pub fn new(options: PromptOptions, history: Arc<HistoryStore>) -> Self {
        Self {
            options,
            history,
            reading: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Prompt configuration.
    #[must_use]
    pub fn options(&self) -> &PromptOptions {
        &self.options
    }

    /// Replace the first-line prompt string (outcome decoration).
    pub fn set_prompt<S: Into<String>>(&mut self, prompt: S) {
        self.options.prompt = prompt.into();
    }

    /// Read one logical submission.
    ///
    /// Accumulates physical lines under the continuation rule, supports
    /// clamped recall while no chunks are pending, and resolves with
    /// [`Submission::Cancelled`] on Ctrl+C.
    ///
    /// # Errors
    /// Fails fast with [`PromptError::ReadInProgress`] when a read is
    /// already outstanding.
    pub async fn read_submission(&mut self) -> Result<Submission, PromptError> {
        let _token = ReadToken::acquire(&self.reading)?;
        let _raw = RawModeGuard::acquire()?;

        let mut events = EventStream::new();
        let mut builder = SubmissionBuilder::new();
        let mut cursor = RecallCursor::new(self.history.len());
        let mut buffer = String::new();

        draw_line(&self.options.prompt, "")?;

        loop {
            let Some(event) = events.next().await else {
                line_break()?;
                return Ok(Submission::Eof);
            };
            let Event::Key(key) = event? else { continue };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key {
                KeyEvent {
                    code: KeyCode::Char('c'),
                    modifiers: KeyModifiers::CONTROL,
                    ..
                } => {
                    line_break()?;
                    return Ok(Submission::Cancelled);
                }
                KeyEvent {
                    code: KeyCode::Char('d'),
                    modifiers: KeyModifiers::CONTROL,
                    ..
                } if buffer.is_empty() && !builder.has_pending() => {
                    line_break()?;
                    return Ok(Submission::Eof);
                }
                KeyEvent {
                    code: KeyCode::Enter,
                    ..
                } => {
                    line_break()?;
                    match builder.push_line(&buffer) {
                        LineOutcome::NeedsMore => {
                            buffer.clear();
                            draw_line(&self.options.continuation_prompt, "")?;
                        }
                        LineOutcome::Complete(chunks) => {
                            return Ok(Submission::Lines(chunks));
                        }
                    }
                }
                KeyEvent {
                    code: KeyCode::Backspace,
                    ..
                } => {
                    if buffer.pop().is_some() && !self.options.secure {
                        erase_char()?;
                    }
                }
                KeyEvent {
                    code: KeyCode::Up, ..
                } if !self.options.secure && !builder.has_pending() => {
                    cursor.up();
                    buffer = self.recall_text(cursor);
                    draw_line(&self.options.prompt, &buffer)?;
                }
                KeyEvent {
                    code: KeyCode::Down,
                    ..
                } if !self.options.secure && !builder.has_pending() => {
                    cursor.down();
                    buffer = self.recall_text(cursor);
                    draw_line(&self.options.prompt, &buffer)?;
                }
                KeyEvent {
                    code: KeyCode::Char(c),
                    modifiers: KeyModifiers::NONE | KeyModifiers::SHIFT,
                    ..
                } => {
                    buffer.push(c);
                    if !self.options.secure {
                        echo_char(c)?;
                    }
                }
                _ => {}
            }
        }
    }

    /// One-shot masked entry for a single question.
    ///
    /// No echo, no history, no continuation. Returns `None` on Ctrl+C.
    ///
    /// # Errors
    /// Fails fast with [`PromptError::ReadInProgress`] when a read is
    /// already outstanding.
    pub async fn read_secret(&mut self, question: &str) -> Result<Option<String>, PromptError> {
        let _token = ReadToken::acquire(&self.reading)?;
        let _raw = RawModeGuard::acquire()?;

        let mut events = EventStream::new();
        let mut buffer = String::new();

        draw_line(question, "")?;

        loop {
            let Some(event) = events.next().await else {
                line_break()?;
                return Ok(None);
            };
            let Event::Key(key) = event? else { continue };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key {
                KeyEvent {
                    code: KeyCode::Char('c'),
                    modifiers: KeyModifiers::CONTROL,
                    ..
                } => {
                    line_break()?;
                    return Ok(None);
                }
                KeyEvent {
                    code: KeyCode::Enter,
                    ..
                } => {
                    line_break()?;
                    return Ok(Some(buffer));
                }
                KeyEvent {
                    code: KeyCode::Backspace,
                    ..
                } => {
                    buffer.pop();
                }
                KeyEvent {
                    code: KeyCode::Char(c),
                    modifiers: KeyModifiers::NONE | KeyModifiers::SHIFT,
                    ..
                } => {
                    buffer.push(c);
                }
                _ => {}
            }
        }
    }

    /// Release the line-editing surface.
    ///
    /// Idempotent and safe to call when no read is pending; each read
    /// also releases the surface itself on every exit path.
    pub fn close(&mut self) {
        let _ = disable_raw_mode();
        tracing::debug!("prompt surface released");
    }

    fn recall_text(&self, cursor: RecallCursor) -> String {
        cursor
            .selected()
            .map(|i| self.history.at(i))
            .unwrap_or_default()
    }
}

#[async_trait]
impl SubmissionSource for LinePrompt {
    async fn read_submission(&mut self) -> Result<Submission, PromptError> {
        Self::read_submission(self).await
    }

    fn set_prompt(&mut self, prompt: String) {
        self.options.prompt = prompt;
    }

    fn options(&self) -> &PromptOptions {
        &self.options
    }

    fn close(&mut self) {
        Self::close(self);
    }
}

fn draw_line(prompt: &str, text: &str) -> Result<(), PromptError> {
    let mut out = io::stdout();
    execute!(
        out,
        Print('\r'),
        Clear(ClearType::CurrentLine),
        Print(prompt),
        Print(text)
    )?;
    out.flush()?;
    Ok(())
}

fn line_break() -> Result<(), PromptError> {
    let mut out = io::stdout();
    execute!(out, Print("\r\n"))?;
    out.flush()?;
    Ok(())
}

fn echo_char(c: char) -> Result<(), PromptError> {
    let mut out = io::stdout();
    execute!(out, Print(c))?;
    out.flush()?;
    Ok(())
}

fn erase_char() -> Result<(), PromptError> {
    let mut out = io::stdout();
    execute!(out, Print("\u{8} \u{8}"))?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_patterns_match() {
        let options = PromptOptions {
            exclusions: vec![Regex::new(r"^\s*#").unwrap()],
            ..PromptOptions::default()
        };
        assert!(options.is_excluded("# a note"));
        assert!(options.is_excluded("   # indented"));
        assert!(!options.is_excluded("echo # trailing"));
    }

    #[tokio::test]
    async fn second_read_fails_fast() {
        let history = Arc::new(HistoryStore::new());
        let prompt = LinePrompt::new(PromptOptions::default(), history);

        let first = ReadToken::acquire(&prompt.reading).unwrap();
        assert!(matches!(
            ReadToken::acquire(&prompt.reading),
            Err(PromptError::ReadInProgress)
        ));
        drop(first);
        assert!(ReadToken::acquire(&prompt.reading).is_ok());
    }
}
