//! Repetition detection: action fingerprints and the sliding repeat window.
//!
//! - **[`fingerprint`]**: [`Fingerprint::of`] collapses an action, its tool
//!   and canonicalized arguments into a 16-character key.
//! - **[`window`]**: [`RepeatWindowDetector`] tracks recent fingerprints and
//!   reports when one recurs often enough to count as a loop.

pub mod fingerprint;
pub mod window;

pub use fingerprint::{Fingerprint, canonical_arguments};
pub use window::{CheckResult, DetectorConfig, LoopEvent, RepeatWindowDetector};
