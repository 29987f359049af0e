//! Remote time-series sync
//!
//! Each cycle fully resyncs the pipeline's own entries instead of diffing:
//!
//! ```text
//! delete(tag, count) ──► post(entries) ──► read(count)
//! ```
//!
//! The steps run strictly in sequence, each awaiting the previous response.
//! A failed step is logged and the next one still runs; nothing is retried
//! or rolled back within a cycle.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::calibration::CurrentGlucose;
use crate::config::SyncConfig;
use crate::errors::RemoteError;
use crate::reading::{Reading, ReadingId};
use crate::traits::EntryStore;

/// Entries to upload for one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    /// Tag used for the delete filter and written on every entry
    pub device_tag: String,
    /// Upper bound for the delete step
    pub delete_count: usize,
    /// Entries fetched by the read-back step
    pub read_count: usize,
    /// Entries to post, most recent first
    pub entries: Vec<Reading>,
}

impl SyncPlan {
    /// Build the upload batch from the canonical history
    ///
    /// Returns `None` when the canonical history is empty: there is nothing
    /// trustworthy to publish this cycle. Otherwise the batch holds every
    /// positive history entry plus the current glucose, dated at the capture
    /// instant, as the newest entry.
    pub fn build(
        history: &[Reading],
        current: CurrentGlucose,
        captured_at: DateTime<Utc>,
        config: &SyncConfig,
    ) -> Option<Self> {
        if history.is_empty() {
            return None;
        }

        let tag = &config.source_tag;
        let current_reading = Reading::new(
            ReadingId(captured_at.timestamp_millis()),
            current.magnitude(),
            captured_at,
            tag.clone(),
        );
        let entries = std::iter::once(current_reading)
            .chain(history.iter().filter(|r| r.value > 0).map(|r| Reading {
                source: tag.clone(),
                ..r.clone()
            }))
            .collect();

        Some(Self {
            device_tag: tag.clone(),
            delete_count: config.delete_count,
            read_count: config.read_count,
            entries,
        })
    }
}

/// Result of one sync step
pub type StepResult<T> = Result<T, RemoteError>;

/// What each sync step reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Delete step
    pub deleted: StepResult<()>,
    /// Post step, with the number of entries sent
    pub posted: StepResult<usize>,
    /// Read-back step
    pub read_back: StepResult<Vec<Reading>>,
}

impl SyncOutcome {
    /// Every step succeeded
    pub fn is_complete(&self) -> bool {
        self.deleted.is_ok() && self.posted.is_ok() && self.read_back.is_ok()
    }

    /// Errors in step order
    pub fn errors(&self) -> Vec<(&'static str, &RemoteError)> {
        let mut errors = Vec::new();
        if let Err(e) = &self.deleted {
            errors.push(("delete", e));
        }
        if let Err(e) = &self.posted {
            errors.push(("post", e));
        }
        if let Err(e) = &self.read_back {
            errors.push(("read", e));
        }
        errors
    }
}

/// Run delete, post and read-back in strict sequence
pub async fn run_sync(store: &dyn EntryStore, plan: &SyncPlan) -> SyncOutcome {
    let deleted = store.delete_entries(&plan.device_tag, plan.delete_count).await;
    if let Err(e) = &deleted {
        warn!("{}: delete failed: {}", store.name(), e);
    }

    let posted = store
        .post_entries(&plan.entries)
        .await
        .map(|()| plan.entries.len());
    match &posted {
        Ok(count) => info!("{}: posted {} entries", store.name(), count),
        Err(e) => warn!("{}: post failed: {}", store.name(), e),
    }

    let read_back = store.read_entries(plan.read_count).await;
    if let Err(e) = &read_back {
        warn!("{}: read failed: {}", store.name(), e);
    }

    SyncOutcome { deleted, posted, read_back }
}
