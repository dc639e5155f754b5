//! Summary functions used by the context compressor.
//!
//! A [`Summarizer`] turns an ordered slice of context entries into summary
//! text. [`DigestSummarizer`] is the built-in variant: it lists the most
//! recent entries with truncated results and makes no model call. Deployments
//! plug in an LLM-backed implementation, or a closure via [`FnSummarizer`].

use super::entry::ContextEntry;
use crate::error::CollaboratorError;

/// Header line of the built-in digest.
pub const DIGEST_HEADER: &str = "CONTEXT SUMMARY (last 20 actions):";

/// Turns context entries into summary text.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, context: &[ContextEntry]) -> Result<String, CollaboratorError>;
}

/// Lists the last `max_entries` entries as `[i] action: result` lines.
#[derive(Debug, Clone)]
pub struct DigestSummarizer {
    /// Entries included, counted from the end. Default: `20`.
    pub max_entries: usize,
    /// Characters of each result kept. Default: `80`.
    pub max_result_chars: usize,
}

impl Default for DigestSummarizer {
    fn default() -> Self {
        Self {
            max_entries: 20,
            max_result_chars: 80,
        }
    }
}

impl Summarizer for DigestSummarizer {
    fn summarize(&self, context: &[ContextEntry]) -> Result<String, CollaboratorError> {
        let start = context.len().saturating_sub(self.max_entries);
        let lines: Vec<String> = context[start..]
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let snippet: String = entry.result().chars().take(self.max_result_chars).collect();
                format!("[{i}] {}: {snippet}", entry.action())
            })
            .collect();
        Ok(format!("{DIGEST_HEADER}\n{}", lines.join("\n")))
    }
}

/// A summarizer backed by a closure.
///
/// ```
/// use cinch_governor::context::{FnSummarizer, Summarizer};
///
/// let summarizer = FnSummarizer::new(|ctx| Ok(format!("{} entries", ctx.len())));
/// assert_eq!(summarizer.summarize(&[]).unwrap(), "0 entries");
/// ```
pub struct FnSummarizer<F>(F)
where
    F: Fn(&[ContextEntry]) -> Result<String, CollaboratorError> + Send + Sync;

impl<F> FnSummarizer<F>
where
    F: Fn(&[ContextEntry]) -> Result<String, CollaboratorError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Summarizer for FnSummarizer<F>
where
    F: Fn(&[ContextEntry]) -> Result<String, CollaboratorError> + Send + Sync,
{
    fn summarize(&self, context: &[ContextEntry]) -> Result<String, CollaboratorError> {
        (self.0)(context)
    }
}
