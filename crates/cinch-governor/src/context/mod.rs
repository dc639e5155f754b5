//! Context compression: entries, summary functions, and the scheduled compressor.
//!
//! Unbounded context growth is itself a driver of repetitive agent behaviour.
//! This module keeps it in check:
//!
//! 1. **[`entry`]**: [`ContextEntry`] (executed steps and injected summaries),
//!    [`SummaryEntry`], and [`TaskState`].
//! 2. **[`summarizer`]**: the [`Summarizer`] seam. [`DigestSummarizer`] is
//!    the built-in, model-free default; [`FnSummarizer`] wraps a closure.
//! 3. **[`compressor`]**: [`ContextCompressor`] decides *when* to compress
//!    and splices the summary in front of the most recent entries.

pub mod compressor;
pub mod entry;
pub mod summarizer;

pub use compressor::{CompressorConfig, ContextCompressor};
pub use entry::{ContextEntry, SUMMARY_ACTION, SummaryEntry, TaskState};
pub use summarizer::{DIGEST_HEADER, DigestSummarizer, FnSummarizer, Summarizer};
