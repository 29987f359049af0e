//! History reconciliation
//!
//! Turns the corrected history returned by the calibration service into the
//! canonical history for this cycle:
//!
//! ```text
//! corrected ─► [one-slot skew trim] ─► [pad to capacity] ─► canonical
//!                     ▲
//!               raw history[0]
//! ```
//!
//! The canonical history is replaced wholesale every cycle. It is never
//! merged with the previous cycle's series.

use chrono::Duration;
use log::debug;

use crate::reading::Reading;

/// Canonical history capacity for the reference sensor class
pub const HISTORY_CAPACITY: usize = 32;

/// Spacing between history slots, used to date padding entries
pub const HISTORY_INTERVAL_MINUTES: i64 = 15;

/// What reconciliation did to the corrected series
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    /// The canonical history for this cycle
    pub history: Vec<Reading>,
    /// A leading skewed slot was dropped
    pub trimmed: bool,
    /// Sentinel slots appended to reach capacity
    pub padded: usize,
}

/// Drop a leading sentinel the service emits one slot ahead of the raw data
///
/// Applies only when the corrected series has more than one entry, its first
/// entry is a sentinel, and its second entry lines up with the newest raw
/// history entry. Returns whether the slot was dropped.
pub fn trim_one_slot_skew(corrected: &mut Vec<Reading>, raw_history: &[Reading]) -> bool {
    let skewed = match (corrected.first(), corrected.get(1), raw_history.first()) {
        (Some(first), Some(second), Some(raw)) => first.is_sentinel() && second.id == raw.id,
        _ => false,
    };
    if skewed {
        corrected.remove(0);
        debug!("dropped leading empty corrected slot newer than the matching raw one");
    }
    skewed
}

/// Right-pad a non-empty series with sentinel slots up to `capacity`
///
/// Padding slots are dated one history interval apart, continuing backwards
/// from the oldest real entry. Returns the number of slots added.
pub fn pad_to_capacity(series: &mut Vec<Reading>, capacity: usize) -> usize {
    let Some(oldest) = series.last().map(|r| r.timestamp) else {
        return 0;
    };
    let missing = capacity.saturating_sub(series.len());
    series.extend((1..=missing).map(|slot| {
        Reading::sentinel(oldest - Duration::minutes(HISTORY_INTERVAL_MINUTES * slot as i64))
    }));
    missing
}

/// Reconcile the corrected history against the raw history
///
/// An absent or empty corrected series yields an empty canonical history,
/// which downstream treats as "no usable corrected data this cycle".
pub fn reconcile_history(
    corrected: Option<Vec<Reading>>,
    raw_history: &[Reading],
    capacity: usize,
) -> Reconciliation {
    let Some(mut history) = corrected else {
        return Reconciliation::default();
    };

    let trimmed = trim_one_slot_skew(&mut history, raw_history);
    if history.is_empty() {
        return Reconciliation { history, trimmed, padded: 0 };
    }

    let padded = pad_to_capacity(&mut history, capacity);
    Reconciliation { history, trimmed, padded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{values, ReadingId, SENTINEL_VALUE};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000, 0).unwrap() + Duration::minutes(minute)
    }

    fn reading(id: i64, value: i32) -> Reading {
        Reading::new(ReadingId(id), value, at(id), "test")
    }

    /// Most-recent-first series with ids `newest, newest-15, ...`
    fn series(newest: i64, values: &[i32]) -> Vec<Reading> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| reading(newest - 15 * i as i64, *v))
            .collect()
    }

    #[test]
    fn drops_leading_sentinel_aligned_with_raw() {
        let raw = series(600, &[100; 28]);
        let mut corrected = series(615, &[0, 110, 120]);
        assert!(trim_one_slot_skew(&mut corrected, &raw));
        assert_eq!(values(&corrected), vec![110, 120]);
    }

    #[test]
    fn keeps_leading_sentinel_when_not_aligned() {
        let raw = series(600, &[100; 28]);
        let mut corrected = series(630, &[0, 110, 120]);
        assert!(!trim_one_slot_skew(&mut corrected, &raw));
        assert_eq!(corrected.len(), 3);
    }

    #[test]
    fn keeps_leading_real_value() {
        let raw = series(600, &[100; 28]);
        let mut corrected = series(615, &[95, 110]);
        assert!(!trim_one_slot_skew(&mut corrected, &raw));
    }

    #[test]
    fn single_entry_never_trimmed() {
        let raw = series(600, &[100]);
        let mut corrected = vec![reading(600, 0)];
        assert!(!trim_one_slot_skew(&mut corrected, &raw));
        assert_eq!(corrected.len(), 1);
    }

    #[test]
    fn absent_corrected_history_is_empty() {
        let raw = series(600, &[100; 28]);
        let out = reconcile_history(None, &raw, HISTORY_CAPACITY);
        assert!(out.history.is_empty());
        assert_eq!(out.padded, 0);

        let out = reconcile_history(Some(Vec::new()), &raw, HISTORY_CAPACITY);
        assert!(out.history.is_empty());
    }

    #[test]
    fn trims_then_pads_new_sensor() {
        let raw = series(600, &[100; 28]);
        let corrected = series(615, &[0, 101, 102, 103, 104, 105, 106, 107, 108, 109]);
        assert_eq!(corrected[1].id, raw[0].id);

        let out = reconcile_history(Some(corrected), &raw, HISTORY_CAPACITY);
        assert!(out.trimmed);
        assert_eq!(out.padded, 23);
        assert_eq!(out.history.len(), HISTORY_CAPACITY);
        assert_eq!(&values(&out.history)[..9], &[101, 102, 103, 104, 105, 106, 107, 108, 109]);
        assert!(out.history[9..].iter().all(|r| r.value == SENTINEL_VALUE));
    }

    #[test]
    fn padding_slots_continue_backwards() {
        let mut history = series(600, &[100, 101]);
        let added = pad_to_capacity(&mut history, 4);
        assert_eq!(added, 2);
        assert_eq!(history[2].timestamp, history[1].timestamp - Duration::minutes(15));
        assert_eq!(history[3].timestamp, history[1].timestamp - Duration::minutes(30));
    }

    #[test]
    fn full_series_is_untouched() {
        let raw = series(600, &[100; 32]);
        let corrected = series(600, &[120; 32]);
        let out = reconcile_history(Some(corrected.clone()), &raw, HISTORY_CAPACITY);
        assert_eq!(out.history, corrected);
        assert!(!out.trimmed);
        assert_eq!(out.padded, 0);
    }
}
