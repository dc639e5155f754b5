//! Escalating exponential backoff for confirmed loops.
//!
//! Each consecutive loop signal calls [`EscalatingBackoff::wait`], which
//! sleeps for `min(base * multiplier^retry_count, cap)` (optionally jittered
//! by ±25%) and advances the retry counter. Once `max_retries` waits have been
//! served without the loop clearing, the next `wait` returns an
//! [`EscalationError`], the signal to force a replan.
//!
//! The jitter factor for the next wait is drawn once and cached, so
//! [`next_duration`](EscalatingBackoff::next_duration) is a faithful peek:
//! repeated calls return the same value, and the following `wait` uses
//! exactly that value. A new factor is drawn after every wait and on reset.

pub mod sleeper;

pub use sleeper::{InterruptibleSleeper, SleepInterrupt, Sleeper, ThreadSleeper};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::EscalationError;

/// Lower bound of the jitter factor.
const JITTER_MIN: f64 = 0.75;
/// Upper bound of the jitter factor.
const JITTER_MAX: f64 = 1.25;

/// Configuration for escalating backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Wait before the first retry, in seconds. Default: `1.0`.
    pub base_seconds: f64,
    /// Growth factor per retry. Default: `2.0`.
    pub multiplier: f64,
    /// Hard ceiling on a single wait, in seconds. Default: `60.0`.
    pub cap_seconds: f64,
    /// Apply ±25% random jitter. Default: `true`.
    pub jitter: bool,
    /// Waits allowed before escalation. Default: `8`.
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_seconds: 1.0,
            multiplier: 2.0,
            cap_seconds: 60.0,
            jitter: true,
            max_retries: 8,
        }
    }
}

impl BackoffConfig {
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base_seconds = base.as_secs_f64();
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap_seconds = cap.as_secs_f64();
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Unjittered delay for a given retry number (0-indexed), in seconds.
    pub fn raw_delay_secs(&self, retry: u32) -> f64 {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let raw = self.base_seconds * self.multiplier.powi(exponent);
        raw.min(self.cap_seconds)
    }
}

/// Stateful backoff timer with a retry budget.
pub struct EscalatingBackoff {
    config: BackoffConfig,
    retry_count: u32,
    pending_jitter: f64,
    sleeper: Box<dyn Sleeper>,
}

impl EscalatingBackoff {
    /// Create a backoff that blocks with [`ThreadSleeper`].
    pub fn new(config: BackoffConfig) -> Self {
        Self::with_sleeper(config, ThreadSleeper)
    }

    /// Create a backoff that suspends through a custom [`Sleeper`].
    pub fn with_sleeper(config: BackoffConfig, sleeper: impl Sleeper + 'static) -> Self {
        let mut backoff = Self {
            config,
            retry_count: 0,
            pending_jitter: 1.0,
            sleeper: Box::new(sleeper),
        };
        backoff.pending_jitter = backoff.draw_jitter();
        backoff
    }

    /// Replace the sleeper (e.g. with an [`InterruptibleSleeper`]).
    pub fn set_sleeper(&mut self, sleeper: impl Sleeper + 'static) {
        self.sleeper = Box::new(sleeper);
    }

    /// Serve one backoff wait.
    ///
    /// Fails with [`EscalationError`] once `max_retries` waits have been
    /// served. Otherwise sleeps (unless `dry_run`), advances the retry
    /// counter and returns the duration.
    pub fn wait(&mut self, dry_run: bool) -> Result<Duration, EscalationError> {
        if self.retry_count >= self.config.max_retries {
            warn!(
                max_retries = self.config.max_retries,
                "backoff budget exhausted, escalating"
            );
            return Err(EscalationError {
                max_retries: self.config.max_retries,
            });
        }

        let duration = self.next_duration();
        warn!(
            retry = self.retry_count + 1,
            max_retries = self.config.max_retries,
            duration_ms = duration.as_millis() as u64,
            dry_run,
            "backoff wait"
        );

        if !dry_run {
            self.sleeper.sleep(duration);
        }

        self.retry_count += 1;
        self.pending_jitter = self.draw_jitter();
        Ok(duration)
    }

    /// Clear the retry counter.
    pub fn reset(&mut self) {
        if self.retry_count > 0 {
            info!(retry_count = self.retry_count, "backoff reset");
        }
        self.retry_count = 0;
        self.pending_jitter = self.draw_jitter();
    }

    /// The duration the next [`wait`](Self::wait) will use. Does not mutate
    /// state, and repeated calls return the same value.
    pub fn next_duration(&self) -> Duration {
        let secs = self.config.raw_delay_secs(self.retry_count) * self.pending_jitter;
        round_to_millis(secs)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Waits still available before escalation.
    pub fn remaining_retries(&self) -> u32 {
        self.config.max_retries.saturating_sub(self.retry_count)
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    fn draw_jitter(&self) -> f64 {
        if self.config.jitter {
            rand::rng().random_range(JITTER_MIN..=JITTER_MAX)
        } else {
            1.0
        }
    }
}

impl Default for EscalatingBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl fmt::Debug for EscalatingBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscalatingBackoff")
            .field("config", &self.config)
            .field("retry_count", &self.retry_count)
            .field("pending_jitter", &self.pending_jitter)
            .finish_non_exhaustive()
    }
}

/// Convert seconds to a `Duration` rounded to whole milliseconds.
/// Non-finite or negative inputs collapse to zero.
fn round_to_millis(secs: f64) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_millis((secs * 1000.0).round() as u64)
}
