//! Shared fixtures for integration tests
//!
//! Provides:
//! - Raw and corrected series builders keyed on sensor minutes
//! - Sensor reads with or without identifiers
//! - Recording fakes for the remote collaborators (see `fakes`)

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use glucosync_core::{Reading, ReadingId, SensorRead, SensorSnapshot};

pub mod fakes;

pub const UID: [u8; 8] = [0xe0, 0x07, 0xa0, 0x00, 0x00, 0x12, 0x34, 0x56];
pub const PATCH_INFO: [u8; 6] = [0x9d, 0x08, 0x30, 0x01, 0x76, 0x25];

/// Minutes the fixture sensor has been running
pub const SENSOR_AGE: u32 = 6000;

/// Instant the fixture sensor was started
pub fn sensor_start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// Instant of sensor minute `minute`
pub fn at(minute: i64) -> DateTime<Utc> {
    sensor_start() + Duration::minutes(minute)
}

/// Capture instant of the fixture read
pub fn captured_at() -> DateTime<Utc> {
    at(SENSOR_AGE as i64)
}

/// Most-recent-first series with ids `newest, newest - step, ...`
pub fn series(newest: i64, step: i64, values: &[i32], source: &str) -> Vec<Reading> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let minute = newest - step * i as i64;
            Reading::new(ReadingId(minute), *v, at(minute), source)
        })
        .collect()
}

/// 16-entry minute-resolution raw trend ending at the capture instant
pub fn raw_trend(latest: i32) -> Vec<Reading> {
    let values: Vec<i32> = (0..16).map(|i| latest - i).collect();
    series(SENSOR_AGE as i64, 1, &values, "raw")
}

/// Raw history of `len` entries, newest aligned to a 15 minute slot
pub fn raw_history(len: usize) -> Vec<Reading> {
    series(newest_history_minute(), 15, &vec![1000; len], "raw")
}

/// Sensor minute of the newest raw history slot
pub fn newest_history_minute() -> i64 {
    (SENSOR_AGE as i64 / 15) * 15
}

pub fn snapshot(with_identifiers: bool) -> SensorSnapshot {
    SensorSnapshot {
        raw_memory: vec![0xa5; 344],
        device_uid: if with_identifiers { UID.to_vec() } else { Vec::new() },
        patch_info: if with_identifiers { PATCH_INFO.to_vec() } else { Vec::new() },
        age_minutes: SENSOR_AGE,
        last_reading_time: captured_at(),
    }
}

pub fn sensor_read(trend_latest: i32, history_len: usize, with_identifiers: bool) -> SensorRead {
    SensorRead {
        snapshot: snapshot(with_identifiers),
        trend: raw_trend(trend_latest),
        history: raw_history(history_len),
    }
}
