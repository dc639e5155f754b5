//! Task decomposition for forced replanning.
//!
//! A [`Decomposer`] splits a stuck [`Task`] into an ordered list of
//! [`Subtask`]s. [`TemplateDecomposer`] is the built-in variant: three fixed
//! steps (re-assess the goal, identify blockers, execute an unblocked
//! sub-path) with no model call. Production deployments plug in an
//! LLM-backed decomposer, or a closure via [`FnDecomposer`].

use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// Characters of the task description quoted in template subtasks.
const DESCRIPTION_PREVIEW_CHARS: usize = 60;

/// The task an agent is working on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Description if present, else the title, else `"unknown task"`.
    pub fn label(&self) -> &str {
        match self.description.as_deref() {
            Some(description) if !description.is_empty() => description,
            _ if !self.title.is_empty() => &self.title,
            _ => "unknown task",
        }
    }
}

/// One step of a replanned task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    /// Machine-readable step kind (e.g. `"clarify_goal"`).
    pub action: String,
    /// Latest compressed context, attached by the replanner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_summary: Option<String>,
}

impl Subtask {
    pub fn new(title: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            action: action.into(),
            context_summary: None,
        }
    }
}

/// Splits a task into ordered subtasks. Must return at least one.
pub trait Decomposer: Send + Sync {
    fn decompose(&self, task: &Task) -> Result<Vec<Subtask>, CollaboratorError>;
}

/// Three generic recovery steps derived from the task label.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateDecomposer;

impl Decomposer for TemplateDecomposer {
    fn decompose(&self, task: &Task) -> Result<Vec<Subtask>, CollaboratorError> {
        let preview: String = task.label().chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
        Ok(vec![
            Subtask::new(
                format!("[Replan] Step 1: Re-assess goal for: {preview}"),
                "clarify_goal",
            ),
            Subtask::new(
                format!("[Replan] Step 2: Identify blockers for: {preview}"),
                "identify_blockers",
            ),
            Subtask::new("[Replan] Step 3: Execute unblocked sub-path", "execute_subpath"),
        ])
    }
}

/// A decomposer backed by a closure.
///
/// ```
/// use cinch_governor::replan::{Decomposer, FnDecomposer, Subtask, Task};
///
/// let decomposer = FnDecomposer::new(|task: &Task| {
///     Ok(vec![Subtask::new(format!("retry {}", task.title), "retry")])
/// });
/// let subtasks = decomposer.decompose(&Task::new("deploy")).unwrap();
/// assert_eq!(subtasks[0].title, "retry deploy");
/// ```
pub struct FnDecomposer<F>(F)
where
    F: Fn(&Task) -> Result<Vec<Subtask>, CollaboratorError> + Send + Sync;

impl<F> FnDecomposer<F>
where
    F: Fn(&Task) -> Result<Vec<Subtask>, CollaboratorError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Decomposer for FnDecomposer<F>
where
    F: Fn(&Task) -> Result<Vec<Subtask>, CollaboratorError> + Send + Sync,
{
    fn decompose(&self, task: &Task) -> Result<Vec<Subtask>, CollaboratorError> {
        (self.0)(task)
    }
}
