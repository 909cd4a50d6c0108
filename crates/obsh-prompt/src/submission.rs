//! Continuation rule for multi-line submissions.

use obsh_core::Chunks;

/// Continuation marker: a trailing backslash means more input follows.
const CONTINUATION_MARKER: char = '\\';

/// Result of feeding one physical line to the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The line ended with the continuation marker; keep reading.
    NeedsMore,
    /// The submission is finalized as one ordered chunk sequence.
    Complete(Chunks),
}

/// Accumulates physical lines into one logical submission.
///
/// Each stored chunk has trailing whitespace and the continuation marker
/// stripped; finalization hands the ordered sequence back without any
/// re-parsing.
#[derive(Debug, Default)]
pub struct SubmissionBuilder {
    pending: Vec<String>,
}

impl SubmissionBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a multi-line entry is in progress.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Feed one raw physical line.
    pub fn push_line(&mut self, raw: &str) -> LineOutcome {
        let line = raw.trim_end();
        if let Some(stripped) = line.strip_suffix(CONTINUATION_MARKER) {
            self.pending.push(stripped.trim_end().to_string());
            LineOutcome::NeedsMore
        } else {
            self.pending.push(line.to_string());
            LineOutcome::Complete(Chunks::new(std::mem::take(&mut self.pending)))
        }
    }
}
