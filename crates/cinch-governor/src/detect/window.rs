//! Sliding-window repeat detection.
//!
//! Keeps the last `window_size` fingerprints and flags a loop when the
//! current fingerprint occurs at least `repeat_threshold` times inside that
//! window. Counting only the recent window (instead of lifetime totals) lets
//! actions that legitimately recur far apart, such as periodic polling, pass
//! while back-to-back repetition is caught immediately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

use super::fingerprint::Fingerprint;
use crate::Arguments;

/// Configuration for the repeat-window detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Number of recent fingerprints kept. Default: `10`.
    pub window_size: usize,
    /// Occurrences within the window that count as a loop. Default: `2`,
    /// i.e. any exact repeat inside the window.
    pub repeat_threshold: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            repeat_threshold: 2,
        }
    }
}

impl DetectorConfig {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_repeat_threshold(mut self, repeat_threshold: usize) -> Self {
        self.repeat_threshold = repeat_threshold;
        self
    }
}

/// Result of a single [`RepeatWindowDetector::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the window count reached the repeat threshold.
    pub is_loop: bool,
    /// Fingerprint of the checked action.
    pub fingerprint: Fingerprint,
    /// Occurrences of this fingerprint in the current window.
    pub window_count: usize,
    /// Occurrences since construction or the last reset. Informational only.
    pub total_count: usize,
}

/// Recorded each time a check crosses the repeat threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopEvent {
    pub iteration: u64,
    pub fingerprint: Fingerprint,
    pub action: String,
    /// Window count at the time of detection.
    pub repeated_count: usize,
    pub detected_at: DateTime<Utc>,
}

/// Bounded fingerprint history plus lifetime counts and a loop event log.
#[derive(Debug)]
pub struct RepeatWindowDetector {
    config: DetectorConfig,
    window: VecDeque<Fingerprint>,
    totals: HashMap<Fingerprint, usize>,
    events: Vec<LoopEvent>,
}

impl RepeatWindowDetector {
    /// Create a detector. A zero window or threshold is raised to 1.
    pub fn new(config: DetectorConfig) -> Self {
        let config = DetectorConfig {
            window_size: config.window_size.max(1),
            repeat_threshold: config.repeat_threshold.max(1),
        };
        Self {
            window: VecDeque::with_capacity(config.window_size),
            totals: HashMap::new(),
            events: Vec::new(),
            config,
        }
    }

    /// Record an action and report whether it is looping.
    pub fn check(
        &mut self,
        iteration: u64,
        action: &str,
        tool: &str,
        arguments: &Arguments,
    ) -> CheckResult {
        let fingerprint = Fingerprint::of(action, tool, arguments);

        if self.window.len() >= self.config.window_size {
            self.window.pop_front();
        }
        self.window.push_back(fingerprint.clone());

        let total = self.totals.entry(fingerprint.clone()).or_insert(0);
        *total += 1;
        let total_count = *total;

        let window_count = self.window.iter().filter(|f| **f == fingerprint).count();
        let is_loop = window_count >= self.config.repeat_threshold;

        if is_loop {
            warn!(
                iteration,
                action,
                tool,
                fingerprint = %fingerprint,
                window_count,
                "loop detected: action repeated within window"
            );
            self.events.push(LoopEvent {
                iteration,
                fingerprint: fingerprint.clone(),
                action: action.to_string(),
                repeated_count: window_count,
                detected_at: Utc::now(),
            });
        } else {
            debug!(iteration, action, window_count, "detector: no loop");
        }

        CheckResult {
            is_loop,
            fingerprint,
            window_count,
            total_count,
        }
    }

    /// Clear the window and lifetime counts. The event log is kept.
    pub fn reset(&mut self) {
        self.window.clear();
        self.totals.clear();
        info!("repeat window detector reset");
    }

    /// Loop events recorded so far, oldest first.
    pub fn loop_events(&self) -> &[LoopEvent] {
        &self.events
    }

    /// Current number of fingerprints in the window.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl Default for RepeatWindowDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(q: &str) -> Arguments {
        let mut args = Arguments::new();
        args.insert("query".into(), json!(q));
        args
    }

    #[test]
    fn no_loop_on_unique_actions() {
        let mut detector = RepeatWindowDetector::default();
        let none = Arguments::new();
        for (i, action) in ["search", "browse", "write", "read", "deploy"]
            .iter()
            .enumerate()
        {
            assert!(!detector.check(i as u64, action, "", &none).is_loop);
        }
        assert!(detector.loop_events().is_empty());
    }

    #[test]
    fn loop_on_repeat() {
        let mut detector =
            RepeatWindowDetector::new(DetectorConfig::default().with_window_size(5));
        detector.check(1, "web_search", "web_search", &query("foo"));
        let result = detector.check(2, "web_search", "web_search", &query("foo"));
        assert!(result.is_loop);
        assert_eq!(result.window_count, 2);
        assert_eq!(result.total_count, 2);
    }

    #[test]
    fn threshold_reached_on_exact_call() {
        let mut detector =
            RepeatWindowDetector::new(DetectorConfig::default().with_repeat_threshold(3));
        let args = query("foo");
        assert!(!detector.check(1, "a", "t", &args).is_loop);
        assert!(!detector.check(2, "a", "t", &args).is_loop);
        assert!(detector.check(3, "a", "t", &args).is_loop);
    }

    #[test]
    fn different_args_no_loop() {
        let mut detector = RepeatWindowDetector::default();
        assert!(!detector.check(1, "web_search", "", &query("foo")).is_loop);
        assert!(!detector.check(2, "web_search", "", &query("bar")).is_loop);
    }

    #[test]
    fn repeats_outside_window_are_not_loops() {
        let mut detector =
            RepeatWindowDetector::new(DetectorConfig::default().with_window_size(3));
        let none = Arguments::new();
        detector.check(1, "poll", "", &none);
        detector.check(2, "a", "", &none);
        detector.check(3, "b", "", &none);
        detector.check(4, "c", "", &none);
        let result = detector.check(5, "poll", "", &none);
        assert!(!result.is_loop);
        assert_eq!(result.window_count, 1);
        assert_eq!(result.total_count, 2);
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut detector =
            RepeatWindowDetector::new(DetectorConfig::default().with_window_size(4));
        let none = Arguments::new();
        for i in 0..20 {
            detector.check(i, &format!("action_{i}"), "", &none);
            assert!(detector.window_len() <= 4);
        }
        assert_eq!(detector.window_len(), 4);
    }

    #[test]
    fn reset_clears_window_but_keeps_events() {
        let mut detector = RepeatWindowDetector::default();
        detector.check(1, "web_search", "", &query("foo"));
        detector.check(2, "web_search", "", &query("foo"));
        detector.reset();
        let result = detector.check(3, "web_search", "", &query("foo"));
        assert!(!result.is_loop);
        assert_eq!(result.total_count, 1);
        assert_eq!(detector.loop_events().len(), 1);
    }

    #[test]
    fn loop_events_recorded() {
        let mut detector = RepeatWindowDetector::default();
        let none = Arguments::new();
        detector.check(1, "act", "", &none);
        detector.check(2, "act", "", &none);
        let events = detector.loop_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].iteration, 2);
        assert_eq!(events[0].action, "act");
        assert_eq!(events[0].repeated_count, 2);
    }

    #[test]
    fn zero_config_is_clamped() {
        let detector = RepeatWindowDetector::new(DetectorConfig {
            window_size: 0,
            repeat_threshold: 0,
        });
        assert_eq!(detector.config().window_size, 1);
        assert_eq!(detector.config().repeat_threshold, 1);
    }
}
