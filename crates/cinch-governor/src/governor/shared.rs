//! Thread-safe handle to a [`Governor`] shared by several agent workers.
//!
//! All state is mutated in place, so concurrent workers go through one
//! `Arc<Mutex<Governor>>`. A backoff wait blocks while the lock is held:
//! every worker sharing the handle is throttled together.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Governor, GovernorStats, SafeguardOutcome};
use crate::Arguments;
use crate::context::{ContextEntry, TaskState};
use crate::error::GovernorError;
use crate::replan::Task;

/// Cloneable, lock-protected [`Governor`].
#[derive(Debug, Clone)]
pub struct SharedGovernor {
    inner: Arc<Mutex<Governor>>,
}

impl SharedGovernor {
    pub fn new(governor: Governor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(governor)),
        }
    }

    /// Lock the governor. A poisoned lock is recovered; the governor's
    /// state is always consistent between calls.
    pub fn lock(&self) -> MutexGuard<'_, Governor> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut Governor) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn maybe_summarize(
        &self,
        iteration: u64,
        context: Vec<ContextEntry>,
        task_state: Option<&TaskState>,
    ) -> Result<Vec<ContextEntry>, GovernorError> {
        self.lock().maybe_summarize(iteration, context, task_state)
    }

    pub fn check_and_handle(
        &self,
        iteration: u64,
        action: &str,
        tool: &str,
        arguments: &Arguments,
        context: &[ContextEntry],
        task: &Task,
    ) -> Result<SafeguardOutcome, GovernorError> {
        self.lock()
            .check_and_handle(iteration, action, tool, arguments, context, task)
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn stats(&self) -> GovernorStats {
        self.lock().stats()
    }
}

impl From<Governor> for SharedGovernor {
    fn from(governor: Governor) -> Self {
        Self::new(governor)
    }
}
