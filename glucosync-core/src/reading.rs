//! Glucose Readings and Series
//!
//! A `Reading` is one glucose sample. Series are plain `Vec<Reading>`
//! ordered most-recent-first: index 0 is always the latest sample, and
//! every stage of the pipeline relies on that.
//!
//! ## Identity
//!
//! Each reading carries an opaque `ReadingId`. For raw readings the
//! transport derives it from the sensor's minute counter; for corrected
//! readings the calibration service returns the same counter. The pipeline
//! only ever compares identities, it never computes them.
//!
//! ## Sentinels
//!
//! A reading with a non-positive value is a placeholder for "no data in
//! this slot". Padding uses `SENTINEL_VALUE` (-1).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Value used for padding slots that hold no data
pub const SENTINEL_VALUE: i32 = -1;

/// Opaque identity of a reading, compared across series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingId(pub i64);

impl ReadingId {
    /// Identity for the sample taken `minutes` after sensor start
    pub const fn from_sensor_minute(minutes: u32) -> Self {
        Self(minutes as i64)
    }
}

/// One glucose sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Cross-series equality key
    pub id: ReadingId,
    /// Value in device units; non-positive means "no data"
    pub value: i32,
    /// Raw temperature term used by temperature-compensated calibration
    #[serde(default)]
    pub raw_temperature: i32,
    /// Sample instant
    pub timestamp: DateTime<Utc>,
    /// Producer tag
    #[serde(default)]
    pub source: String,
}

impl Reading {
    /// Create a reading with no temperature term
    pub fn new(id: ReadingId, value: i32, timestamp: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self {
            id,
            value,
            raw_temperature: 0,
            timestamp,
            source: source.into(),
        }
    }

    /// Placeholder reading for an empty slot
    pub fn sentinel(timestamp: DateTime<Utc>) -> Self {
        Self {
            id: ReadingId::default(),
            value: SENTINEL_VALUE,
            raw_temperature: 0,
            timestamp,
            source: String::new(),
        }
    }

    /// Attach the raw temperature term
    pub fn with_temperature(mut self, raw_temperature: i32) -> Self {
        self.raw_temperature = raw_temperature;
        self
    }

    /// Slot holds no data
    pub const fn is_sentinel(&self) -> bool {
        self.value <= 0
    }

    /// Milliseconds since the Unix epoch
    pub fn epoch_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Instant of the sample taken `minute` minutes after sensor start
///
/// `capture` is when the sensor was read and `sensor_age_minutes` how long
/// it had been running at that point.
pub fn sensor_minute_timestamp(
    capture: DateTime<Utc>,
    sensor_age_minutes: u32,
    minute: u32,
) -> DateTime<Utc> {
    let start = capture - Duration::minutes(i64::from(sensor_age_minutes));
    start + Duration::minutes(i64::from(minute))
}

/// Values of a series, for log lines
pub fn values(series: &[Reading]) -> Vec<i32> {
    series.iter().map(|r| r.value).collect()
}
