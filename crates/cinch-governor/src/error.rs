//! Error types for the governor and its collaborators.
//!
//! Two failure kinds matter to callers:
//!
//! - [`EscalationError`]: the backoff retry budget is exhausted. This is a
//!   control-flow signal, not a fault: [`Governor`](crate::governor::Governor)
//!   always consumes it and answers with a forced replan.
//! - [`GovernorError`]: a pluggable collaborator (decomposer, summarizer)
//!   failed or returned unusable data, or the caller handed in malformed
//!   input/configuration. These propagate unchanged.

use thiserror::Error;

/// Error type returned by pluggable collaborators ([`Decomposer`](crate::replan::Decomposer),
/// [`Summarizer`](crate::context::Summarizer)).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// The backoff retry budget has been exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("loop not resolved after {max_retries} retries; escalating to forced replan")]
pub struct EscalationError {
    /// The configured retry budget that was exhausted.
    pub max_retries: u32,
}

/// Errors surfaced by the governor to its caller.
#[derive(Debug, Error)]
pub enum GovernorError {
    /// The decomposer raised while splitting the stuck task.
    #[error("decomposer failed: {0}")]
    Decomposer(#[source] CollaboratorError),

    /// The decomposer returned no subtasks.
    #[error("decomposer returned no subtasks for task '{task}'")]
    EmptyDecomposition { task: String },

    /// The summarizer raised while compressing context.
    #[error("summarizer failed: {0}")]
    Summarizer(#[source] CollaboratorError),

    /// Action arguments could not be turned into a key/value mapping.
    #[error("invalid action arguments: {0}")]
    InvalidArguments(String),

    /// Configuration could not be read or failed validation.
    #[error("invalid governor config: {0}")]
    Config(String),
}
