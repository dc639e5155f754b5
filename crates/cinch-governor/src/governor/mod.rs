//! The governor facade: one call per agent iteration.
//!
//! [`Governor`] owns the detector, backoff, compressor and replanner and
//! drives them as a single state machine:
//!
//! ```text
//! Clean ──repeat──▶ Looping ──wait──▶ BackingOff ──wait──▶ … ──budget spent──▶ Escalated
//!   ▲                                                                           │
//!   └──────────────────────── detector + backoff reset, replan ──────────────────┘
//! ```
//!
//! Callers invoke [`Governor::maybe_summarize`] first each iteration (it may
//! shrink the context), then [`Governor::check_and_handle`] with the action
//! about to run:
//!
//! ```
//! use cinch_governor::prelude::*;
//!
//! let config = GovernorConfig::default().with_dry_run(true);
//! let mut governor = Governor::new(config);
//! let task = Task::new("triage inbox");
//! let mut context = Vec::new();
//!
//! for iteration in 1..=3 {
//!     context = governor.maybe_summarize(iteration, context, None)?;
//!     let outcome = governor.check_and_handle(
//!         iteration,
//!         "tool_call",
//!         "inbox",
//!         &Arguments::new(),
//!         &context,
//!         &task,
//!     )?;
//!     assert_eq!(outcome.loop_detected, iteration > 1);
//!     context.push(ContextEntry::tool_step("tool_call", "inbox", "0 new"));
//! }
//! # Ok::<(), cinch_governor::GovernorError>(())
//! ```

pub mod config;
pub mod events;
pub mod outcome;
pub mod shared;

pub use config::GovernorConfig;
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, GovernorEvent, LoggingHandler,
    NoopHandler,
};
pub use outcome::{GovernorPhase, GovernorStats, SafeguardOutcome};
pub use shared::SharedGovernor;

use std::fmt;
use tracing::{debug, info};

use crate::ActionRecord;
use crate::Arguments;
use crate::backoff::{EscalatingBackoff, Sleeper};
use crate::context::{ContextCompressor, ContextEntry, Summarizer, SummaryEntry, TaskState};
use crate::detect::{LoopEvent, RepeatWindowDetector};
use crate::error::GovernorError;
use crate::replan::{Decomposer, ForceReplanner, REASON_LOOP_ESCALATION, ReplanResult, Task};

/// Per-iteration loop governor.
pub struct Governor {
    config: GovernorConfig,
    detector: RepeatWindowDetector,
    backoff: EscalatingBackoff,
    compressor: ContextCompressor,
    replanner: ForceReplanner,
    event_handler: Box<dyn EventHandler>,
    phase: GovernorPhase,
    last_summarized: Option<u64>,
    iterations_checked: u64,
    backoffs_applied: u64,
}

impl Governor {
    /// Build a governor with the built-in collaborators, a blocking sleeper
    /// and no event handler.
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            detector: RepeatWindowDetector::new(config.detector.clone()),
            backoff: EscalatingBackoff::new(config.backoff.clone()),
            compressor: ContextCompressor::new(config.compressor.clone()),
            replanner: ForceReplanner::new(),
            event_handler: Box::new(NoopHandler),
            phase: GovernorPhase::Clean,
            last_summarized: None,
            iterations_checked: 0,
            backoffs_applied: 0,
            config,
        }
    }

    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.event_handler = Box::new(handler);
        self
    }

    /// Suspend backoff waits through `sleeper` instead of `thread::sleep`.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.backoff.set_sleeper(sleeper);
        self
    }

    pub fn with_decomposer(mut self, decomposer: impl Decomposer + 'static) -> Self {
        self.replanner.register_decomposer(decomposer);
        self
    }

    pub fn with_summarizer(mut self, summarizer: impl Summarizer + 'static) -> Self {
        self.compressor.register_summarizer(summarizer);
        self
    }

    /// Swap the decomposition function used for forced replans.
    pub fn register_decomposer(&mut self, decomposer: impl Decomposer + 'static) {
        self.replanner.register_decomposer(decomposer);
    }

    /// Swap the summary function used for context compression.
    pub fn register_summarizer(&mut self, summarizer: impl Summarizer + 'static) {
        self.compressor.register_summarizer(summarizer);
    }

    // ── Per-iteration operations ──────────────────────────────────

    /// Compress `context` if `iteration` is on the compression schedule.
    ///
    /// Independent of loop handling; its only coupling is that the latest
    /// summary is attached to subtasks on escalation.
    pub fn maybe_summarize(
        &mut self,
        iteration: u64,
        context: Vec<ContextEntry>,
        task_state: Option<&TaskState>,
    ) -> Result<Vec<ContextEntry>, GovernorError> {
        let before = self.compressor.summary_history().len();
        let context = self.compressor.maybe_compress(iteration, context, task_state)?;
        if self.compressor.summary_history().len() > before {
            self.last_summarized = Some(iteration);
            if let Some(entry) = self.compressor.summary_history().last() {
                self.event_handler.on_event(&GovernorEvent::Compressed(entry));
            }
        }
        Ok(context)
    }

    /// Check the action about to run and apply the matching remedy.
    ///
    /// - no loop: the backoff budget is restored and nothing else happens;
    /// - loop with budget left: one backoff wait is served;
    /// - loop with the budget spent: the task is replanned and the detector
    ///   and backoff start fresh.
    ///
    /// `summarized` is reported on every path, including the clean one: it is
    /// true whenever [`maybe_summarize`](Self::maybe_summarize) compressed at
    /// this same iteration, independent of loop handling.
    ///
    /// Only collaborator failures during a replan are returned as errors. In
    /// that case detector and backoff are left as they were, so the next
    /// repeat escalates again.
    pub fn check_and_handle(
        &mut self,
        iteration: u64,
        action: &str,
        tool: &str,
        arguments: &Arguments,
        context: &[ContextEntry],
        task: &Task,
    ) -> Result<SafeguardOutcome, GovernorError> {
        self.iterations_checked += 1;
        let check = self.detector.check(iteration, action, tool, arguments);

        let mut outcome = SafeguardOutcome {
            iteration,
            loop_detected: check.is_loop,
            backoff_applied: false,
            backoff_duration: None,
            summarized: self.last_summarized == Some(iteration),
            force_replanned: false,
            phase: GovernorPhase::Clean,
            check,
            replan: None,
        };

        if !outcome.loop_detected {
            self.backoff.reset();
            self.phase = GovernorPhase::Clean;
            debug!(iteration, action, "governor: clean");
            return Ok(outcome);
        }

        self.phase = GovernorPhase::Looping;
        if let Some(event) = self.detector.loop_events().last() {
            self.event_handler.on_event(&GovernorEvent::LoopDetected(event));
        }

        match self.backoff.wait(self.config.dry_run) {
            Ok(duration) => {
                self.backoffs_applied += 1;
                self.phase = GovernorPhase::BackingOff;
                outcome.backoff_applied = true;
                outcome.backoff_duration = Some(duration);
                self.event_handler.on_event(&GovernorEvent::BackoffApplied {
                    iteration,
                    retry: self.backoff.retry_count(),
                    max_retries: self.backoff.config().max_retries,
                    duration,
                    dry_run: self.config.dry_run,
                });
            }
            Err(escalation) => {
                self.event_handler.on_event(&GovernorEvent::Escalated {
                    iteration,
                    max_retries: escalation.max_retries,
                });

                let summary = self.summary_for_replan(context);
                let result = self
                    .replanner
                    .replan(task, REASON_LOOP_ESCALATION, summary.as_deref())?;

                self.detector.reset();
                self.backoff.reset();
                self.phase = GovernorPhase::Escalated;
                info!(
                    iteration,
                    subtasks = result.subtasks.len(),
                    "loop escalated: detector and backoff reset for replanned subtasks"
                );
                self.event_handler.on_event(&GovernorEvent::Replanned {
                    iteration,
                    result: &result,
                });

                outcome.force_replanned = true;
                outcome.replan = Some(result);
            }
        }

        outcome.phase = self.phase;
        Ok(outcome)
    }

    /// [`check_and_handle`](Self::check_and_handle) for a prepared record.
    pub fn check_record(
        &mut self,
        record: &ActionRecord,
        context: &[ContextEntry],
        task: &Task,
    ) -> Result<SafeguardOutcome, GovernorError> {
        self.check_and_handle(
            record.iteration,
            &record.action,
            &record.tool,
            &record.arguments,
            context,
            task,
        )
    }

    /// Clear detector and backoff state after a clean run. Histories stay.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.backoff.reset();
        self.phase = GovernorPhase::Clean;
        self.event_handler
            .on_event(&GovernorEvent::Reset { iteration: None });
    }

    /// Latest compressor summary, else the newest summary entry in `context`.
    fn summary_for_replan(&self, context: &[ContextEntry]) -> Option<String> {
        self.compressor
            .latest_summary()
            .or_else(|| {
                context
                    .iter()
                    .rev()
                    .find_map(ContextEntry::as_summary)
                    .map(|entry| entry.summary.as_str())
            })
            .map(str::to_string)
    }

    // ── Observability ─────────────────────────────────────────────

    pub fn loop_events(&self) -> &[LoopEvent] {
        self.detector.loop_events()
    }

    pub fn summary_history(&self) -> &[SummaryEntry] {
        self.compressor.summary_history()
    }

    pub fn replan_history(&self) -> &[ReplanResult] {
        self.replanner.replan_history()
    }

    pub fn latest_summary(&self) -> Option<&str> {
        self.compressor.latest_summary()
    }

    pub fn retry_count(&self) -> u32 {
        self.backoff.retry_count()
    }

    pub fn phase(&self) -> GovernorPhase {
        self.phase
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn stats(&self) -> GovernorStats {
        GovernorStats {
            iterations_checked: self.iterations_checked,
            loop_events: self.detector.loop_events().len(),
            backoffs_applied: self.backoffs_applied,
            compressions: self.compressor.summary_history().len(),
            replans: self.replanner.replan_history().len(),
            retry_count: self.backoff.retry_count(),
            window_len: self.detector.window_len(),
            phase: self.phase,
        }
    }
}

impl Default for Governor {
    fn default() -> Self {
        Self::new(GovernorConfig::default())
    }
}

impl fmt::Debug for Governor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Governor")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("detector", &self.detector)
            .field("backoff", &self.backoff)
            .field("compressor", &self.compressor)
            .field("replanner", &self.replanner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffConfig;
    use crate::context::FnSummarizer;
    use crate::detect::DetectorConfig;
    use crate::replan::{FnDecomposer, Subtask};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn list_args() -> Arguments {
        let mut args = Arguments::new();
        args.insert("action".into(), json!("list"));
        args
    }

    fn small_config() -> GovernorConfig {
        GovernorConfig::default()
            .with_detector(
                DetectorConfig::default()
                    .with_window_size(6)
                    .with_repeat_threshold(2),
            )
            .with_backoff(BackoffConfig::default().with_jitter(false).with_max_retries(2))
            .with_dry_run(true)
    }

    fn task() -> Task {
        Task::new("Investigate loop")
    }

    fn step(governor: &mut Governor, iteration: u64) -> SafeguardOutcome {
        governor
            .check_and_handle(iteration, "tool_call", "task_manage", &list_args(), &[], &task())
            .unwrap()
    }

    #[test]
    fn clean_action_has_no_flags() {
        let mut governor = Governor::new(small_config());
        let outcome = step(&mut governor, 1);
        assert!(!outcome.loop_detected);
        assert!(!outcome.intervened());
        assert!(!outcome.summarized);
        assert_eq!(outcome.phase, GovernorPhase::Clean);
        assert!(outcome.replan.is_none());
    }

    #[test]
    fn escalation_cycle() {
        let mut governor = Governor::new(small_config());
        assert!(!step(&mut governor, 1).loop_detected);

        let second = step(&mut governor, 2);
        assert!(second.backoff_applied);
        assert_eq!(second.backoff_duration, Some(std::time::Duration::from_secs(1)));
        assert_eq!(second.phase, GovernorPhase::BackingOff);

        let third = step(&mut governor, 3);
        assert!(third.backoff_applied);
        assert_eq!(governor.retry_count(), 2);

        let fourth = step(&mut governor, 4);
        assert!(fourth.loop_detected);
        assert!(!fourth.backoff_applied);
        assert!(fourth.force_replanned);
        assert_eq!(fourth.phase, GovernorPhase::Escalated);
        assert_eq!(fourth.replan.as_ref().map(|r| r.subtasks.len()), Some(3));
        assert_eq!(governor.retry_count(), 0);

        let fifth = step(&mut governor, 5);
        assert!(!fifth.loop_detected);
        assert_eq!(governor.phase(), GovernorPhase::Clean);

        let stats = governor.stats();
        assert_eq!(stats.iterations_checked, 5);
        assert_eq!(stats.loop_events, 3);
        assert_eq!(stats.backoffs_applied, 2);
        assert_eq!(stats.replans, 1);
    }

    #[test]
    fn clean_check_restores_budget() {
        let mut governor = Governor::new(small_config());
        step(&mut governor, 1);
        step(&mut governor, 2);
        assert_eq!(governor.retry_count(), 1);
        governor
            .check_and_handle(3, "other", "fs", &Arguments::new(), &[], &task())
            .unwrap();
        assert_eq!(governor.retry_count(), 0);
    }

    #[test]
    fn summarized_reported_on_clean_path() {
        let mut governor = Governor::new(small_config().with_compressor(
            crate::context::CompressorConfig::default().with_trigger_iteration(3),
        ));
        governor
            .maybe_summarize(3, vec![ContextEntry::step("a", "b")], None)
            .unwrap();
        let outcome = step(&mut governor, 3);
        assert!(!outcome.loop_detected);
        assert!(!outcome.intervened());
        assert!(outcome.summarized);
        assert!(!step(&mut governor, 4).summarized);
    }

    #[test]
    fn replan_carries_latest_summary() {
        let mut governor = Governor::new(
            small_config().with_compressor(
                crate::context::CompressorConfig::default().with_trigger_iteration(1),
            ),
        )
        .with_summarizer(FnSummarizer::new(|_| Ok("stuck listing tasks".into())));

        governor
            .maybe_summarize(1, vec![ContextEntry::step("a", "b")], None)
            .unwrap();
        let outcomes: Vec<_> = (1..=4).map(|i| step(&mut governor, i)).collect();
        assert!(outcomes[0].summarized);
        assert!(!outcomes[1].summarized);

        let replan = outcomes[3].replan.as_ref().unwrap();
        assert!(
            replan
                .subtasks
                .iter()
                .all(|s| s.context_summary.as_deref() == Some("stuck listing tasks"))
        );
    }

    #[test]
    fn replan_falls_back_to_summary_in_context() {
        let mut governor = Governor::new(small_config());
        let mut compressor = ContextCompressor::new(
            crate::context::CompressorConfig::default().with_trigger_iteration(1),
        );
        compressor.register_summarizer(FnSummarizer::new(|_| Ok("from caller".into())));
        let context = compressor
            .maybe_compress(1, vec![ContextEntry::step("a", "b")], None)
            .unwrap();

        let mut last = None;
        for i in 1..=4 {
            last = Some(
                governor
                    .check_and_handle(i, "tool_call", "task_manage", &list_args(), &context, &task())
                    .unwrap(),
            );
        }
        let replan = last.and_then(|o| o.replan).unwrap();
        assert_eq!(replan.subtasks[0].context_summary.as_deref(), Some("from caller"));
    }

    #[test]
    fn decomposer_failure_propagates_and_keeps_state() {
        let mut governor = Governor::new(small_config())
            .with_decomposer(FnDecomposer::new(|_| Err("planner offline".into())));
        for i in 1..=3 {
            step(&mut governor, i);
        }
        let err = governor
            .check_and_handle(4, "tool_call", "task_manage", &list_args(), &[], &task())
            .unwrap_err();
        assert!(matches!(err, GovernorError::Decomposer(_)));
        assert_eq!(governor.retry_count(), 2);
        assert!(governor.replan_history().is_empty());
    }

    #[test]
    fn custom_decomposer_registered_at_runtime() {
        let mut governor = Governor::new(small_config());
        governor.register_decomposer(FnDecomposer::new(|task: &Task| {
            Ok(vec![Subtask::new(format!("split {}", task.title), "split")])
        }));
        let outcome = (1..=4).map(|i| step(&mut governor, i)).last().unwrap();
        let replan = outcome.replan.unwrap();
        assert_eq!(replan.subtasks.len(), 1);
        assert_eq!(replan.subtasks[0].title, "split Investigate loop");
    }

    #[test]
    fn events_reach_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut governor = Governor::new(small_config()).with_event_handler(FnEventHandler::new(
            move |event: &GovernorEvent<'_>| {
                let name = match event {
                    GovernorEvent::LoopDetected(_) => "loop",
                    GovernorEvent::BackoffApplied { .. } => "backoff",
                    GovernorEvent::Compressed(_) => "compressed",
                    GovernorEvent::Escalated { .. } => "escalated",
                    GovernorEvent::Replanned { .. } => "replanned",
                    GovernorEvent::Reset { .. } => "reset",
                };
                sink.lock().unwrap().push(name);
            },
        ));
        for i in 1..=4 {
            step(&mut governor, i);
        }
        governor.reset();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "loop", "backoff", "loop", "backoff", "loop", "escalated", "replanned", "reset"
            ]
        );
    }

    #[test]
    fn reset_keeps_histories() {
        let mut governor = Governor::new(small_config());
        step(&mut governor, 1);
        step(&mut governor, 2);
        governor.reset();
        assert_eq!(governor.retry_count(), 0);
        assert_eq!(governor.stats().window_len, 0);
        assert_eq!(governor.loop_events().len(), 1);
        assert!(!step(&mut governor, 3).loop_detected);
    }

    #[test]
    fn check_record_matches_direct_call() {
        let mut governor = Governor::new(small_config());
        let record =
            ActionRecord::from_serializable(1, "tool_call", "task_manage", &json!({"action": "list"}))
                .unwrap();
        governor.check_record(&record, &[], &task()).unwrap();
        assert!(step(&mut governor, 2).loop_detected);
    }
}
