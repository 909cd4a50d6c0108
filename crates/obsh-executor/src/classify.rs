//! Input classification.

/// Inputs that request graceful teardown, matched exactly after trimming.
pub const QUIT_TOKENS: &[&str] = &["exit", "quit"];

/// Annotation marker: inputs starting with this attach a comment to the
/// most recent history entry instead of executing.
const COMMENT_PREFIX: char = '#';

/// What one logical input means, decided in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputClass {
    /// Graceful teardown request.
    Quit,
    /// Comment to attach to the most recent entry; never spawns.
    Annotation(String),
    /// Anything else: run it.
    Executable,
}

/// Classify one single-line command form.
#[must_use]
pub fn classify(command: &str) -> InputClass {
    let trimmed = command.trim();
    if QUIT_TOKENS.contains(&trimmed) {
        InputClass::Quit
    } else if let Some(rest) = trimmed.strip_prefix(COMMENT_PREFIX) {
        InputClass::Annotation(rest.trim().to_string())
    } else {
        InputClass::Executable
    }
}
