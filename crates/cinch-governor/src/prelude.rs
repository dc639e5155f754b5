//! Convenience re-exports for common `cinch-governor` types.
//!
//! ```
//! use cinch_governor::prelude::*;
//! ```
//!
//! Pulls in the governor, its configuration, the input and context types,
//! the collaborator seams and the event handlers. Component internals
//! (detector, backoff, compressor, replanner used standalone) are imported
//! from their modules directly.

// ── Inputs ──────────────────────────────────────────────────────────
pub use crate::{ActionRecord, Arguments, GovernorError};

// ── Governor ────────────────────────────────────────────────────────
pub use crate::governor::{
    CompositeEventHandler, EventHandler, FnEventHandler, Governor, GovernorConfig, GovernorEvent,
    GovernorPhase, GovernorStats, LoggingHandler, NoopHandler, SafeguardOutcome, SharedGovernor,
};

// ── Component configuration ─────────────────────────────────────────
pub use crate::backoff::BackoffConfig;
pub use crate::context::CompressorConfig;
pub use crate::detect::DetectorConfig;

// ── Context and replanning ──────────────────────────────────────────
pub use crate::context::{ContextEntry, FnSummarizer, Summarizer, TaskState};
pub use crate::replan::{Decomposer, FnDecomposer, Subtask, Task};
