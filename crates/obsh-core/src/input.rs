//! Logical submission data.

/// The ordered chunk sequence of one logical submission.
///
/// Chunks are the physical lines of a multi-line entry with continuation
/// markers and trailing whitespace already stripped. Both renderings below
/// derive from the same sequence with no re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunks(Vec<String>);

impl Chunks {
    /// Wrap an ordered chunk sequence.
    #[must_use]
    pub fn new(lines: Vec<String>) -> Self {
        Self(lines)
    }

    /// The single-line executable form: chunks joined by one space.
    #[must_use]
    pub fn command(&self) -> String {
        self.0.join(" ")
    }

    /// The raw transcript form: chunks joined by newlines.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.0.join("\n")
    }

    /// The underlying chunk sequence.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.0
    }

    /// Whether the submission holds no text at all.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|l| l.trim().is_empty())
    }
}

impl From<Vec<String>> for Chunks {
    fn from(lines: Vec<String>) -> Self {
        Self::new(lines)
    }
}
