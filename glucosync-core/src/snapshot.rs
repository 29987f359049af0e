//! Sensor reads handed over by the transport layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SnapshotError;
use crate::reading::Reading;

/// Fixed length of the device UID for the reference sensor class
pub const DEVICE_UID_LEN: usize = 8;

/// Fixed length of the patch info for the reference sensor class
pub const PATCH_INFO_LEN: usize = 6;

/// Raw sensor memory and metadata for one reconciliation cycle
///
/// Owned by its cycle. Only the identifier fields outlive it, through the
/// identifier cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    /// Raw sensor memory (FRAM)
    pub raw_memory: Vec<u8>,
    /// Device UID, empty when the transport did not report it
    #[serde(default)]
    pub device_uid: Vec<u8>,
    /// Patch info, empty when the transport did not report it
    #[serde(default)]
    pub patch_info: Vec<u8>,
    /// Minutes since the sensor was started
    pub age_minutes: u32,
    /// When the sensor was read
    pub last_reading_time: DateTime<Utc>,
}

impl SensorSnapshot {
    /// Check identifier lengths
    pub fn validate(&self) -> Result<(), SnapshotError> {
        check_len("device_uid", &self.device_uid, DEVICE_UID_LEN)?;
        check_len("patch_info", &self.patch_info, PATCH_INFO_LEN)
    }
}

fn check_len(field: &'static str, bytes: &[u8], expected: usize) -> Result<(), SnapshotError> {
    if bytes.is_empty() || bytes.len() == expected {
        Ok(())
    } else {
        Err(SnapshotError::IdentifierLength { field, expected, actual: bytes.len() })
    }
}

/// Everything the transport yields for one read
///
/// Byte-level decoding of `trend` and `history` from the raw memory happens
/// before this point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRead {
    /// Raw memory and identifiers
    pub snapshot: SensorSnapshot,
    /// Minute-resolution raw trend, most recent first
    pub trend: Vec<Reading>,
    /// Raw history, most recent first
    pub history: Vec<Reading>,
}

impl SensorRead {
    /// Check the snapshot and that there is a latest trend entry
    pub fn validate(&self) -> Result<(), SnapshotError> {
        self.snapshot.validate()?;
        if self.trend.is_empty() {
            return Err(SnapshotError::EmptyTrend);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(uid: Vec<u8>, patch: Vec<u8>) -> SensorSnapshot {
        SensorSnapshot {
            raw_memory: vec![0; 344],
            device_uid: uid,
            patch_info: patch,
            age_minutes: 60,
            last_reading_time: Utc::now(),
        }
    }

    #[test]
    fn identifiers_may_be_empty_or_fixed_length() {
        assert!(snapshot(vec![], vec![]).validate().is_ok());
        assert!(snapshot(vec![1; 8], vec![2; 6]).validate().is_ok());
        assert_eq!(
            snapshot(vec![1; 7], vec![]).validate(),
            Err(SnapshotError::IdentifierLength { field: "device_uid", expected: 8, actual: 7 })
        );
    }

    #[test]
    fn read_requires_trend() {
        let read = SensorRead {
            snapshot: snapshot(vec![], vec![]),
            trend: vec![],
            history: vec![],
        };
        assert_eq!(read.validate(), Err(SnapshotError::EmptyTrend));
    }
}
