//! Scheduled context compression.
//!
//! Fires once at `trigger_iteration` and then every `repeat_every`
//! iterations. Each firing summarizes the current context, records a
//! [`SummaryEntry`], and returns a new context of the summary followed by at
//! most `max_entries_kept` of the most recent original entries. Older entries
//! are dropped: history fidelity is traded for a bounded context.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use tracing::info;

use super::entry::{ContextEntry, SummaryEntry, TaskState};
use super::summarizer::{DigestSummarizer, Summarizer};
use crate::error::GovernorError;

/// Configuration for scheduled compression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    /// First iteration that compresses. Default: `15`.
    pub trigger_iteration: u64,
    /// Period after the first trigger. Default: `10`.
    pub repeat_every: u64,
    /// Original entries kept after the summary. Default: `50`.
    pub max_entries_kept: usize,
    /// Append task state to the summary text. Default: `true`.
    pub include_task_state: bool,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            trigger_iteration: 15,
            repeat_every: 10,
            max_entries_kept: 50,
            include_task_state: true,
        }
    }
}

impl CompressorConfig {
    pub fn with_trigger_iteration(mut self, iteration: u64) -> Self {
        self.trigger_iteration = iteration;
        self
    }

    pub fn with_repeat_every(mut self, every: u64) -> Self {
        self.repeat_every = every;
        self
    }

    pub fn with_max_entries_kept(mut self, kept: usize) -> Self {
        self.max_entries_kept = kept;
        self
    }

    pub fn with_task_state(mut self, include: bool) -> Self {
        self.include_task_state = include;
        self
    }
}

/// Compresses context on an iteration schedule.
pub struct ContextCompressor {
    config: CompressorConfig,
    summarizer: Box<dyn Summarizer>,
    history: Vec<SummaryEntry>,
}

impl ContextCompressor {
    /// Create a compressor using [`DigestSummarizer`].
    pub fn new(config: CompressorConfig) -> Self {
        Self::with_summarizer(config, DigestSummarizer::default())
    }

    pub fn with_summarizer(config: CompressorConfig, summarizer: impl Summarizer + 'static) -> Self {
        Self {
            config,
            summarizer: Box::new(summarizer),
            history: Vec::new(),
        }
    }

    /// Swap the summary function at runtime.
    pub fn register_summarizer(&mut self, summarizer: impl Summarizer + 'static) {
        self.summarizer = Box::new(summarizer);
        info!("custom summarizer registered");
    }

    /// Whether `iteration` is a compression point.
    ///
    /// True at `trigger_iteration` and at `trigger_iteration + k * repeat_every`
    /// for every positive `k`. With `repeat_every == 0` only the first
    /// trigger fires.
    pub fn should_trigger(&self, iteration: u64) -> bool {
        let trigger = self.config.trigger_iteration;
        if iteration == trigger {
            return true;
        }
        if iteration < trigger {
            return false;
        }
        (iteration - trigger)
            .checked_rem(self.config.repeat_every)
            .is_some_and(|r| r == 0)
    }

    /// Compress `context` if `iteration` is a compression point; otherwise
    /// return it untouched.
    ///
    /// Summarizer failures are returned as [`GovernorError::Summarizer`] and
    /// leave the history unchanged.
    pub fn maybe_compress(
        &mut self,
        iteration: u64,
        context: Vec<ContextEntry>,
        task_state: Option<&TaskState>,
    ) -> Result<Vec<ContextEntry>, GovernorError> {
        if !self.should_trigger(iteration) {
            return Ok(context);
        }

        info!(
            iteration,
            entries = context.len(),
            "compressing context"
        );

        let mut summary = self
            .summarizer
            .summarize(&context)
            .map_err(GovernorError::Summarizer)?;

        if self.config.include_task_state
            && let Some(state) = task_state.filter(|s| !s.is_empty())
        {
            let _ = write!(summary, "\n\nTASK STATE @ iter {iteration}:\n");
            for (key, value) in state {
                let _ = writeln!(summary, "  {key}: {value}");
            }
        }

        let entry = SummaryEntry {
            iteration,
            summary,
            entries_compressed: context.len(),
            created_at: Utc::now(),
        };
        self.history.push(entry.clone());

        let keep_from = context.len().saturating_sub(self.config.max_entries_kept);
        let mut compressed = Vec::with_capacity(context.len() - keep_from + 1);
        compressed.push(ContextEntry::Summary(entry));
        compressed.extend(context.into_iter().skip(keep_from));
        Ok(compressed)
    }

    /// Every summary produced so far, oldest first.
    pub fn summary_history(&self) -> &[SummaryEntry] {
        &self.history
    }

    /// Text of the most recent summary.
    pub fn latest_summary(&self) -> Option<&str> {
        self.history.last().map(|entry| entry.summary.as_str())
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }
}

impl Default for ContextCompressor {
    fn default() -> Self {
        Self::new(CompressorConfig::default())
    }
}

impl fmt::Debug for ContextCompressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCompressor")
            .field("config", &self.config)
            .field("summaries", &self.history.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::entry::SUMMARY_ACTION;
    use crate::context::summarizer::FnSummarizer;

    fn context(n: usize) -> Vec<ContextEntry> {
        (0..n)
            .map(|i| ContextEntry::step(format!("act_{i}"), "ok"))
            .collect()
    }

    #[test]
    fn triggers_at_configured_iteration_only() {
        let compressor = ContextCompressor::default();
        assert!(compressor.should_trigger(15));
        assert!(!compressor.should_trigger(14));
        assert!(!compressor.should_trigger(16));
        assert!(!compressor.should_trigger(0));
    }

    #[test]
    fn triggers_periodically_after_first() {
        let compressor = ContextCompressor::default();
        for i in 0..100 {
            let expected = i >= 15 && (i - 15) % 10 == 0;
            assert_eq!(compressor.should_trigger(i), expected, "iteration {i}");
        }
    }

    #[test]
    fn zero_period_fires_once() {
        let compressor =
            ContextCompressor::new(CompressorConfig::default().with_repeat_every(0));
        assert!(compressor.should_trigger(15));
        assert!(!compressor.should_trigger(25));
    }

    #[test]
    fn prunes_context_behind_summary() {
        let mut compressor =
            ContextCompressor::new(CompressorConfig::default().with_max_entries_kept(20));
        let out = compressor.maybe_compress(15, context(100), None).unwrap();
        assert_eq!(out.len(), 21);
        assert_eq!(out[0].action(), SUMMARY_ACTION);
        assert_eq!(out[1].action(), "act_80");
        assert_eq!(out[20].action(), "act_99");
        assert_eq!(compressor.summary_history()[0].entries_compressed, 100);
    }

    #[test]
    fn short_context_is_kept_whole() {
        let mut compressor = ContextCompressor::default();
        let out = compressor.maybe_compress(15, context(20), None).unwrap();
        assert_eq!(out.len(), 21);
        assert_eq!(out[0].action(), SUMMARY_ACTION);
    }

    #[test]
    fn no_op_off_schedule() {
        let mut compressor = ContextCompressor::default();
        let ctx = context(5);
        let out = compressor.maybe_compress(10, ctx.clone(), None).unwrap();
        assert_eq!(out, ctx);
        assert!(compressor.summary_history().is_empty());
    }

    #[test]
    fn task_state_appended_when_enabled() {
        let mut compressor = ContextCompressor::default();
        let mut state = TaskState::new();
        state.insert("task_id".into(), "abc123".into());
        compressor.maybe_compress(15, context(3), Some(&state)).unwrap();
        let summary = compressor.latest_summary().unwrap();
        assert!(summary.contains("TASK STATE @ iter 15:"));
        assert!(summary.contains("  task_id: abc123"));
    }

    #[test]
    fn task_state_skipped_when_disabled() {
        let mut compressor =
            ContextCompressor::new(CompressorConfig::default().with_task_state(false));
        let mut state = TaskState::new();
        state.insert("task_id".into(), "abc123".into());
        compressor.maybe_compress(15, context(3), Some(&state)).unwrap();
        assert!(!compressor.latest_summary().unwrap().contains("TASK STATE"));
    }

    #[test]
    fn custom_summarizer_used() {
        let mut compressor = ContextCompressor::default();
        compressor.register_summarizer(FnSummarizer::new(|_| Ok("CUSTOM SUMMARY".into())));
        let out = compressor
            .maybe_compress(15, vec![ContextEntry::step("x", "y")], None)
            .unwrap();
        assert_eq!(out[0].result(), "CUSTOM SUMMARY");
    }

    #[test]
    fn summarizer_failure_propagates_without_history() {
        let mut compressor = ContextCompressor::with_summarizer(
            CompressorConfig::default(),
            FnSummarizer::new(|_| Err("boom".into())),
        );
        let err = compressor.maybe_compress(15, context(3), None).unwrap_err();
        assert!(matches!(err, GovernorError::Summarizer(_)));
        assert!(compressor.summary_history().is_empty());
    }

    #[test]
    fn repeated_compression_stays_bounded() {
        let mut compressor =
            ContextCompressor::new(CompressorConfig::default().with_max_entries_kept(5));
        let mut ctx = Vec::new();
        for i in 1..=60u64 {
            ctx.push(ContextEntry::step(format!("act_{i}"), "ok"));
            ctx = compressor.maybe_compress(i, ctx, None).unwrap();
            if compressor.should_trigger(i) {
                assert!(ctx.len() <= 6);
            }
        }
        assert_eq!(compressor.summary_history().len(), 5);
    }
}
