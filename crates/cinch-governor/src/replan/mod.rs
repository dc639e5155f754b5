//! Forced replanning on loop escalation.
//!
//! When the backoff budget runs out, the governor stops waiting for the loop
//! to clear on its own and hands the stuck task to a [`ForceReplanner`]. The
//! replanner asks its [`Decomposer`] for an ordered list of subtasks, tags
//! each with the most recent context summary, and records the result.

pub mod decomposer;

pub use decomposer::{Decomposer, FnDecomposer, Subtask, Task, TemplateDecomposer};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::error::GovernorError;

/// Reason recorded when the governor replans after backoff exhaustion.
pub const REASON_LOOP_ESCALATION: &str = "loop_escalation";

/// Record of one forced replan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplanResult {
    pub triggered: bool,
    pub reason: String,
    pub subtasks: Vec<Subtask>,
    pub original_task: Task,
    pub created_at: DateTime<Utc>,
}

/// Decomposes stuck tasks and keeps a history of every replan.
pub struct ForceReplanner {
    decomposer: Box<dyn Decomposer>,
    history: Vec<ReplanResult>,
}

impl ForceReplanner {
    /// Create a replanner using [`TemplateDecomposer`].
    pub fn new() -> Self {
        Self::with_decomposer(TemplateDecomposer)
    }

    pub fn with_decomposer(decomposer: impl Decomposer + 'static) -> Self {
        Self {
            decomposer: Box::new(decomposer),
            history: Vec::new(),
        }
    }

    /// Swap the decomposition function at runtime.
    pub fn register_decomposer(&mut self, decomposer: impl Decomposer + 'static) {
        self.decomposer = Box::new(decomposer);
        info!("custom decomposer registered");
    }

    /// Decompose `task` and record the result.
    ///
    /// `context_summary`, when given, is attached to every subtask. A failing
    /// decomposer yields [`GovernorError::Decomposer`]; an empty subtask list
    /// yields [`GovernorError::EmptyDecomposition`]. Neither is recorded.
    pub fn replan(
        &mut self,
        task: &Task,
        reason: &str,
        context_summary: Option<&str>,
    ) -> Result<ReplanResult, GovernorError> {
        let mut subtasks = self
            .decomposer
            .decompose(task)
            .map_err(GovernorError::Decomposer)?;

        if subtasks.is_empty() {
            return Err(GovernorError::EmptyDecomposition {
                task: task.label().to_string(),
            });
        }

        if let Some(summary) = context_summary {
            for subtask in &mut subtasks {
                subtask.context_summary = Some(summary.to_string());
            }
        }

        info!(
            reason,
            task = task.label(),
            subtasks = subtasks.len(),
            with_summary = context_summary.is_some(),
            "forced replan"
        );

        let result = ReplanResult {
            triggered: true,
            reason: reason.to_string(),
            subtasks,
            original_task: task.clone(),
            created_at: Utc::now(),
        };
        self.history.push(result.clone());
        Ok(result)
    }

    /// Every replan performed so far, oldest first.
    pub fn replan_history(&self) -> &[ReplanResult] {
        &self.history
    }
}

impl Default for ForceReplanner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ForceReplanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForceReplanner")
            .field("replans", &self.history.len())
            .finish_non_exhaustive()
    }
}
