//! Per-iteration outcome, state-machine phase and stats snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::detect::CheckResult;
use crate::replan::ReplanResult;

/// Position in the loop-handling state machine.
///
/// `Clean → Looping → BackingOff* → Escalated → Clean`. `Looping` is
/// transient inside one call; it is only left visible when the replan that
/// should follow an exhausted budget fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernorPhase {
    #[default]
    Clean,
    Looping,
    BackingOff,
    Escalated,
}

impl GovernorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Looping => "looping",
            Self::BackingOff => "backing_off",
            Self::Escalated => "escalated",
        }
    }
}

impl fmt::Display for GovernorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the governor decided for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeguardOutcome {
    pub iteration: u64,
    pub loop_detected: bool,
    pub backoff_applied: bool,
    /// Duration of the wait served this iteration, if any.
    pub backoff_duration: Option<Duration>,
    /// `maybe_summarize` compressed context at this iteration.
    pub summarized: bool,
    pub force_replanned: bool,
    /// Phase after handling this iteration.
    pub phase: GovernorPhase,
    pub check: CheckResult,
    pub replan: Option<ReplanResult>,
}

impl SafeguardOutcome {
    /// True when the governor intervened (waited or replanned).
    pub fn intervened(&self) -> bool {
        self.backoff_applied || self.force_replanned
    }
}

/// Counters describing a governor's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorStats {
    pub iterations_checked: u64,
    pub loop_events: usize,
    pub backoffs_applied: u64,
    pub compressions: usize,
    pub replans: usize,
    pub retry_count: u32,
    pub window_len: usize,
    pub phase: GovernorPhase,
}
