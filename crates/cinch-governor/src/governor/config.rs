//! Configuration for the [`Governor`](super::Governor).
//!
//! Every setting has a default, so an empty config (or an empty TOML file)
//! yields a working governor. Override individual sections through struct
//! fields or the builder methods:
//!
//! ```
//! use cinch_governor::governor::GovernorConfig;
//! use cinch_governor::detect::DetectorConfig;
//!
//! let config = GovernorConfig::default()
//!     .with_detector(DetectorConfig::default().with_window_size(6))
//!     .with_dry_run(true);
//! assert!(config.validate().is_ok());
//! ```
//!
//! From TOML:
//!
//! ```toml
//! dry_run = true
//!
//! [detector]
//! window_size = 6
//! repeat_threshold = 2
//!
//! [backoff]
//! base_seconds = 0.5
//! cap_seconds = 30.0
//! max_retries = 4
//!
//! [compressor]
//! trigger_iteration = 20
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::backoff::BackoffConfig;
use crate::context::CompressorConfig;
use crate::detect::DetectorConfig;
use crate::error::GovernorError;

/// Aggregate configuration for all governor components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub detector: DetectorConfig,
    pub backoff: BackoffConfig,
    pub compressor: CompressorConfig,
    /// Skip real sleeping in backoff waits. Retry accounting is unchanged.
    pub dry_run: bool,
}

impl GovernorConfig {
    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_compressor(mut self, compressor: CompressorConfig) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, GovernorError> {
        let config: Self =
            toml::from_str(source).map_err(|e| GovernorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GovernorError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| GovernorError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&source)?;
        debug!("Loaded governor config from {}", path.display());
        Ok(config)
    }

    /// Reject values that would make a component meaningless.
    pub fn validate(&self) -> Result<(), GovernorError> {
        let fail = |msg: String| Err(GovernorError::Config(msg));

        if self.detector.window_size == 0 {
            return fail("detector.window_size must be at least 1".into());
        }
        if self.detector.repeat_threshold == 0 {
            return fail("detector.repeat_threshold must be at least 1".into());
        }

        let backoff = &self.backoff;
        if !backoff.base_seconds.is_finite() || backoff.base_seconds < 0.0 {
            return fail(format!(
                "backoff.base_seconds must be a non-negative number, got {}",
                backoff.base_seconds
            ));
        }
        if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
            return fail(format!(
                "backoff.multiplier must be at least 1.0, got {}",
                backoff.multiplier
            ));
        }
        if !backoff.cap_seconds.is_finite() || backoff.cap_seconds < backoff.base_seconds {
            return fail(format!(
                "backoff.cap_seconds ({}) must be at least base_seconds ({})",
                backoff.cap_seconds, backoff.base_seconds
            ));
        }

        if self.compressor.repeat_every == 0 {
            return fail("compressor.repeat_every must be at least 1".into());
        }

        Ok(())
    }
}
