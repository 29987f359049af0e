//! Pipeline configuration
//!
//! ```rust
//! use glucosync_core::{AlarmThresholds, PipelineConfig};
//!
//! let config = PipelineConfig::default()
//!     .alarm(AlarmThresholds { high: 180, low: 72 })
//!     .source_tag("glucosync-test");
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::alarm::AlarmThresholds;
use crate::errors::ConfigError;
use crate::reconcile::HISTORY_CAPACITY;

/// Tag identifying entries this pipeline uploads
pub const DEFAULT_SOURCE_TAG: &str = "glucosync";

/// Remote time-series sync settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Device tag written on every uploaded entry and used as the delete filter
    pub source_tag: String,
    /// Upper bound on entries removed by the delete step
    pub delete_count: usize,
    /// Entries fetched by the read-back step
    pub read_count: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_tag: DEFAULT_SOURCE_TAG.into(),
            delete_count: HISTORY_CAPACITY,
            read_count: 100,
        }
    }
}

/// Settings for the reconciliation pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Alarm limits
    pub alarm: AlarmThresholds,
    /// Fixed length of the canonical history
    pub history_capacity: usize,
    /// Remote time-series sync
    pub sync: SyncConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            alarm: AlarmThresholds::default(),
            history_capacity: HISTORY_CAPACITY,
            sync: SyncConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Set alarm thresholds
    pub fn alarm(mut self, thresholds: AlarmThresholds) -> Self {
        self.alarm = thresholds;
        self
    }

    /// Set canonical history capacity
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set the uploaded entries' device tag
    pub fn source_tag(mut self, tag: impl Into<String>) -> Self {
        self.sync.source_tag = tag.into();
        self
    }

    /// Set delete and read-back counts
    pub fn sync_counts(mut self, delete_count: usize, read_count: usize) -> Self {
        self.sync.delete_count = delete_count;
        self.sync.read_count = read_count;
        self
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.alarm.validate()?;
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroCount("history_capacity"));
        }
        if self.sync.delete_count == 0 {
            return Err(ConfigError::ZeroCount("sync.delete_count"));
        }
        if self.sync.read_count == 0 {
            return Err(ConfigError::ZeroCount("sync.read_count"));
        }
        if self.sync.source_tag.trim().is_empty() {
            return Err(ConfigError::EmptyTag("sync.source_tag"));
        }
        Ok(())
    }
}
