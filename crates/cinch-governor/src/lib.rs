//! Loop governor for autonomous agent action loops.
//!
//! An agent that keeps emitting the same action (the same tool, the same
//! arguments) burns rounds until it hits a hard iteration cap. `cinch-governor`
//! watches the action stream, recognizes the repetition early, and escalates
//! through increasingly forceful remedies:
//!
//! 1. **throttle** each repeat with exponential backoff;
//! 2. **compress** accumulated context on a schedule so it stops feeding the
//!    cycle;
//! 3. **replan** the stuck task into smaller subtasks once the backoff budget
//!    runs out, then start fresh.
//!
//! The core abstraction is the [`Governor`](governor::Governor), called once
//! per agent iteration:
//!
//! ```
//! use cinch_governor::prelude::*;
//! use serde_json::json;
//!
//! let config = GovernorConfig::default()
//!     .with_backoff(BackoffConfig::default().with_max_retries(1))
//!     .with_dry_run(true);
//! let mut governor = Governor::new(config);
//! let task = Task::new("Investigate repeated task_manage:list loop");
//!
//! let record = ActionRecord::from_serializable(0, "tool_call", "task_manage", &json!({"action": "list"}))?;
//! let mut replanned = false;
//! for iteration in 1..=3 {
//!     let record = ActionRecord { iteration, ..record.clone() };
//!     let outcome = governor.check_record(&record, &[], &task)?;
//!     replanned |= outcome.force_replanned;
//! }
//! assert!(replanned);
//! assert_eq!(governor.replan_history()[0].subtasks.len(), 3);
//! # Ok::<(), cinch_governor::GovernorError>(())
//! ```
//!
//! # Where to find things
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`detect`] | [`Fingerprint`](detect::Fingerprint), [`RepeatWindowDetector`](detect::RepeatWindowDetector) |
//! | [`backoff`] | [`EscalatingBackoff`](backoff::EscalatingBackoff), the [`Sleeper`](backoff::Sleeper) seam |
//! | [`context`] | [`ContextCompressor`](context::ContextCompressor), the [`Summarizer`](context::Summarizer) seam |
//! | [`replan`] | [`ForceReplanner`](replan::ForceReplanner), the [`Decomposer`](replan::Decomposer) seam |
//! | [`governor`] | [`Governor`](governor::Governor), config, events, [`SharedGovernor`](governor::SharedGovernor) |
//! | [`error`] | [`EscalationError`], [`GovernorError`] |
//!
//! Summarization and decomposition are pluggable: the built-in
//! [`DigestSummarizer`](context::DigestSummarizer) and
//! [`TemplateDecomposer`](replan::TemplateDecomposer) make no model calls.
//! Real deployments register LLM-backed implementations via
//! [`Governor::register_summarizer`](governor::Governor::register_summarizer)
//! and [`Governor::register_decomposer`](governor::Governor::register_decomposer).

pub mod backoff;
pub mod context;
pub mod detect;
pub mod error;
pub mod governor;
pub mod prelude;
pub mod replan;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::{CollaboratorError, EscalationError, GovernorError};

/// Action arguments: a JSON object.
pub type Arguments = serde_json::Map<String, Value>;

// ── Action input ───────────────────────────────────────────────────

/// One action an agent is about to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub iteration: u64,
    pub action: String,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl ActionRecord {
    pub fn new(
        iteration: u64,
        action: impl Into<String>,
        tool: impl Into<String>,
        arguments: Arguments,
    ) -> Self {
        Self {
            iteration,
            action: action.into(),
            tool: tool.into(),
            arguments,
        }
    }

    /// Build a record from any serializable argument value.
    ///
    /// The value must serialize to a JSON object; `null` is accepted as
    /// "no arguments". Anything else is rejected with
    /// [`GovernorError::InvalidArguments`].
    pub fn from_serializable(
        iteration: u64,
        action: impl Into<String>,
        tool: impl Into<String>,
        arguments: &impl Serialize,
    ) -> Result<Self, GovernorError> {
        let value = serde_json::to_value(arguments)
            .map_err(|e| GovernorError::InvalidArguments(e.to_string()))?;
        let arguments = match value {
            Value::Object(map) => map,
            Value::Null => Arguments::new(),
            other => {
                return Err(GovernorError::InvalidArguments(format!(
                    "expected a key/value mapping, got {}",
                    json_kind(&other)
                )));
            }
        };
        Ok(Self::new(iteration, action, tool, arguments))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
