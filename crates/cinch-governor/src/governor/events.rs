//! Events and handlers for the [`Governor`](super::Governor).
//!
//! The governor reports every intervention it makes through a
//! [`GovernorEvent`]. Callers implement [`EventHandler`] to observe them for
//! logging, dashboards, metrics, or alerting.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or silent runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use std::time::Duration;
use tracing::{info, warn};

use crate::context::SummaryEntry;
use crate::detect::LoopEvent;
use crate::replan::ReplanResult;

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the governor.
#[derive(Debug)]
pub enum GovernorEvent<'a> {
    /// The detector flagged the current action as a repeat.
    LoopDetected(&'a LoopEvent),
    /// A backoff wait was served (or skipped in dry-run mode).
    BackoffApplied {
        iteration: u64,
        retry: u32,
        max_retries: u32,
        duration: Duration,
        dry_run: bool,
    },
    /// Context was compressed into a summary entry.
    Compressed(&'a SummaryEntry),
    /// The backoff budget ran out; a forced replan follows.
    Escalated { iteration: u64, max_retries: u32 },
    /// A forced replan completed.
    Replanned {
        iteration: u64,
        result: &'a ReplanResult,
    },
    /// Detector and backoff state were cleared.
    Reset { iteration: Option<u64> },
}

/// Handler for governor events.
///
/// The default implementation ignores everything.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &GovernorEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```
/// use cinch_governor::governor::{FnEventHandler, GovernorEvent};
///
/// let handler = FnEventHandler::new(|event: &GovernorEvent<'_>| {
///     if let GovernorEvent::Escalated { iteration, .. } = event {
///         eprintln!("escalated at {iteration}");
///     }
/// });
/// # let _ = handler;
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&GovernorEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&GovernorEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&GovernorEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &GovernorEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches each event to every inner handler, in registration order.
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    /// Add a handler from an `Option`. `None` is a no-op.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &GovernorEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs governor events through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &GovernorEvent<'_>) {
        match event {
            GovernorEvent::LoopDetected(loop_event) => {
                warn!(
                    "[iter {}] loop: '{}' seen {}x in window ({})",
                    loop_event.iteration,
                    loop_event.action,
                    loop_event.repeated_count,
                    loop_event.fingerprint
                );
            }
            GovernorEvent::BackoffApplied {
                iteration,
                retry,
                max_retries,
                duration,
                dry_run,
            } => {
                info!(
                    "[iter {iteration}] backoff {retry}/{max_retries}: {}ms{}",
                    duration.as_millis(),
                    if *dry_run { " (dry run)" } else { "" }
                );
            }
            GovernorEvent::Compressed(entry) => {
                info!(
                    "[iter {}] compressed {} entries into summary ({} chars)",
                    entry.iteration,
                    entry.entries_compressed,
                    entry.summary.chars().count()
                );
            }
            GovernorEvent::Escalated {
                iteration,
                max_retries,
            } => {
                warn!("[iter {iteration}] backoff exhausted after {max_retries} retries");
            }
            GovernorEvent::Replanned { iteration, result } => {
                info!(
                    "[iter {iteration}] replanned '{}' into {} subtask(s) ({})",
                    result.original_task.label(),
                    result.subtasks.len(),
                    result.reason
                );
            }
            GovernorEvent::Reset { iteration } => match iteration {
                Some(i) => info!("[iter {i}] governor state reset"),
                None => info!("governor state reset"),
            },
        }
    }
}
