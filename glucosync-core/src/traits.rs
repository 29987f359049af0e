//! Remote collaborator traits
//!
//! The pipeline talks to two remote services, both through these seams:
//!
//! ```text
//!                ┌──────────────────────┐
//! snapshot ────► │ CalibrationService   │ ──► parameters / corrected history
//!                └──────────────────────┘
//!                ┌──────────────────────┐
//! canonical ───► │ EntryStore           │ ──► delete → post → read back
//!                └──────────────────────┘
//! ```
//!
//! Implementations live in `glucosync-connectors`. Each call is awaited by
//! the cycle task; none of them touches the canonical state directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::alarm::{AlarmClass, TrendClass};
use crate::calibration::CalibrationParameters;
use crate::errors::RemoteResult;
use crate::reading::Reading;
use crate::snapshot::SensorSnapshot;

/// Outbound calibration call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationRequest {
    /// Raw sensor memory
    pub raw_memory: Vec<u8>,
    /// When the memory was read
    pub captured_at: DateTime<Utc>,
}

impl CalibrationRequest {
    pub fn from_snapshot(snapshot: &SensorSnapshot) -> Self {
        Self {
            raw_memory: snapshot.raw_memory.clone(),
            captured_at: snapshot.last_reading_time,
        }
    }
}

/// Outbound history call; only built once both identifiers are known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Raw sensor memory
    pub raw_memory: Vec<u8>,
    /// When the memory was read
    pub captured_at: DateTime<Utc>,
    /// Minutes since sensor start, used to date corrected entries
    pub sensor_age_minutes: u32,
    /// Device UID
    pub device_uid: Vec<u8>,
    /// Patch info
    pub patch_info: Vec<u8>,
}

impl HistoryRequest {
    /// Build from a snapshot whose identifiers have been resolved
    pub fn from_snapshot(snapshot: &SensorSnapshot) -> Option<Self> {
        if snapshot.device_uid.is_empty() || snapshot.patch_info.is_empty() {
            return None;
        }
        Some(Self {
            raw_memory: snapshot.raw_memory.clone(),
            captured_at: snapshot.last_reading_time,
            sensor_age_minutes: snapshot.age_minutes,
            device_uid: snapshot.device_uid.clone(),
            patch_info: snapshot.patch_info.clone(),
        })
    }
}

/// Inbound history response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CorrectedHistory {
    /// Corrected history, most recent first
    pub values: Vec<Reading>,
    /// Real-time glucose, when the service computed one
    pub real_time_glucose: Option<i32>,
    /// Alarm classification
    pub alarm: AlarmClass,
    /// Trend direction
    pub trend: TrendClass,
}

/// Remote oracle providing calibration parameters and corrected history
#[async_trait]
pub trait CalibrationService: Send + Sync {
    /// Fetch calibration parameters for the raw memory
    async fn calibration(&self, request: &CalibrationRequest) -> RemoteResult<CalibrationParameters>;

    /// Fetch the corrected history and classifications
    async fn history(&self, request: &HistoryRequest) -> RemoteResult<CorrectedHistory>;

    /// Name used in logs and notices
    fn name(&self) -> &'static str {
        "calibration service"
    }
}

/// External time-series store
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Delete up to `count` entries tagged with `device_tag`
    async fn delete_entries(&self, device_tag: &str, count: usize) -> RemoteResult<()>;

    /// Upload entries as new records
    async fn post_entries(&self, entries: &[Reading]) -> RemoteResult<()>;

    /// Most recent `count` entries currently held remotely
    async fn read_entries(&self, count: usize) -> RemoteResult<Vec<Reading>>;

    /// Name used in logs and notices
    fn name(&self) -> &'static str {
        "entry store"
    }
}
