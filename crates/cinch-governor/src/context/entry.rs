//! Context entries accumulated by the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Action marker carried by summary entries.
pub const SUMMARY_ACTION: &str = "__context_summary__";

/// Task metadata rendered into summaries (key → value, sorted by key).
pub type TaskState = BTreeMap<String, String>;

/// A compressed summary of earlier context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Iteration at which the compression ran.
    pub iteration: u64,
    pub summary: String,
    /// Number of context entries the summary was built from.
    pub entries_compressed: usize,
    pub created_at: DateTime<Utc>,
}

/// One item of agent context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextEntry {
    /// An executed step and its result.
    Step {
        action: String,
        #[serde(default)]
        tool: String,
        #[serde(default)]
        result: String,
    },
    /// A compression summary injected by the governor.
    Summary(SummaryEntry),
}

impl ContextEntry {
    /// A step with no tool.
    pub fn step(action: impl Into<String>, result: impl Into<String>) -> Self {
        Self::Step {
            action: action.into(),
            tool: String::new(),
            result: result.into(),
        }
    }

    pub fn tool_step(
        action: impl Into<String>,
        tool: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self::Step {
            action: action.into(),
            tool: tool.into(),
            result: result.into(),
        }
    }

    /// The action marker; [`SUMMARY_ACTION`] for summaries.
    pub fn action(&self) -> &str {
        match self {
            Self::Step { action, .. } => action,
            Self::Summary(_) => SUMMARY_ACTION,
        }
    }

    /// Step result, or the summary text.
    pub fn result(&self) -> &str {
        match self {
            Self::Step { result, .. } => result,
            Self::Summary(entry) => &entry.summary,
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self, Self::Summary(_))
    }

    pub fn as_summary(&self) -> Option<&SummaryEntry> {
        match self {
            Self::Summary(entry) => Some(entry),
            Self::Step { .. } => None,
        }
    }
}
