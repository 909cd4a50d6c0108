//! Multi-line prompt with recall and secure entry.
//!
//! Provides:
//! - `LinePrompt` - Raw-mode line editor producing logical submissions
//! - `SubmissionSource` - The seam session loops read submissions through
//! - `SubmissionBuilder` - Continuation-rule accumulation of physical lines
//! - `RecallCursor` - Clamped navigation over a shared history

pub mod prompt;
pub mod recall;
pub mod submission;

pub use prompt::{LinePrompt, PromptError, PromptOptions, Submission, SubmissionSource};
pub use recall::RecallCursor;
pub use submission::{LineOutcome, SubmissionBuilder};
