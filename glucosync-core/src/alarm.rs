//! Alarm evaluation and the classifications reported by the calibration service

use log::warn;
use serde::{Deserialize, Serialize};

use crate::calibration::CurrentGlucose;
use crate::errors::ConfigError;

/// Alarm classification reported alongside the corrected history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmClass {
    #[serde(rename = "PROJECTED_HIGH_GLUCOSE")]
    ProjectedHigh,
    #[serde(rename = "HIGH_GLUCOSE")]
    High,
    #[serde(rename = "GLUCOSE_OK")]
    InRange,
    #[serde(rename = "LOW_GLUCOSE")]
    Low,
    #[serde(rename = "PROJECTED_LOW_GLUCOSE")]
    ProjectedLow,
    #[default]
    #[serde(other)]
    NotDetermined,
}

/// Trend direction reported alongside the corrected history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendClass {
    FallingQuickly,
    Falling,
    Stable,
    Rising,
    RisingQuickly,
    #[default]
    #[serde(other)]
    NotDetermined,
}

/// Configured alarm limits in device units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmThresholds {
    /// Values strictly above this alarm
    pub high: i32,
    /// Values strictly below this alarm
    pub low: i32,
}

impl Default for AlarmThresholds {
    fn default() -> Self {
        Self { high: 200, low: 70 }
    }
}

impl AlarmThresholds {
    /// Create thresholds, rejecting `low >= high`
    pub fn new(high: i32, low: i32) -> Result<Self, ConfigError> {
        let thresholds = Self { high, low };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Check the threshold ordering
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.low >= self.high {
            return Err(ConfigError::ThresholdOrder { low: self.low, high: self.high });
        }
        Ok(())
    }

    /// Which limit, if any, `magnitude` crosses
    ///
    /// Zero is "no reading yet" and never alarms. Values exactly at a
    /// threshold do not alarm.
    pub fn classify(&self, magnitude: i32) -> Option<AlarmKind> {
        if magnitude <= 0 {
            None
        } else if magnitude > self.high {
            Some(AlarmKind::AboveHigh)
        } else if magnitude < self.low {
            Some(AlarmKind::BelowLow)
        } else {
            None
        }
    }
}

/// Which limit fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmKind {
    AboveHigh,
    BelowLow,
}

/// A fired alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmEvent {
    /// Absolute current glucose that crossed a limit
    pub magnitude: i32,
    /// Which limit it crossed
    pub kind: AlarmKind,
    /// Thresholds in force when it fired
    pub thresholds: AlarmThresholds,
    /// The current glucose is the raw fallback (no calibration known)
    pub offline: bool,
}

/// Side effect run when an alarm fires (sound, vibration, push...)
pub trait AlarmSink: Send + Sync {
    /// Called once per fired alarm, on the cycle's task
    fn trigger(&self, event: &AlarmEvent);
}

/// Alarm sink with no side effect of its own
///
/// `evaluate_alarm` already writes the alarm log line before any sink runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlarmSink;

impl AlarmSink for LogAlarmSink {
    fn trigger(&self, _event: &AlarmEvent) {}
}

/// Evaluate the current glucose against the thresholds and fire the sink
pub fn evaluate_alarm(
    current: CurrentGlucose,
    thresholds: &AlarmThresholds,
    sink: &dyn AlarmSink,
) -> Option<AlarmEvent> {
    let magnitude = current.magnitude();
    let kind = thresholds.classify(magnitude)?;
    let event = AlarmEvent {
        magnitude,
        kind,
        thresholds: *thresholds,
        offline: current.is_offline(),
    };
    warn!(
        "ALARM: current glucose: {} (settings: high: {}, low: {})",
        magnitude, thresholds.high, thresholds.low
    );
    sink.trigger(&event);
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<AlarmEvent>>);

    impl AlarmSink for RecordingSink {
        fn trigger(&self, event: &AlarmEvent) {
            self.0.lock().unwrap().push(*event);
        }
    }

    #[test]
    fn boundaries_do_not_alarm() {
        let t = AlarmThresholds::new(200, 70).unwrap();
        assert_eq!(t.classify(200), None);
        assert_eq!(t.classify(70), None);
        assert_eq!(t.classify(201), Some(AlarmKind::AboveHigh));
        assert_eq!(t.classify(69), Some(AlarmKind::BelowLow));
        assert_eq!(t.classify(0), None);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        assert!(AlarmThresholds::new(70, 200).is_err());
        assert!(AlarmThresholds::new(100, 100).is_err());
    }

    #[test]
    fn evaluates_magnitude_of_offline_value() {
        let sink = RecordingSink::default();
        let event = evaluate_alarm(CurrentGlucose::Raw(250), &AlarmThresholds::default(), &sink)
            .expect("alarm should fire");
        assert_eq!(event.magnitude, 250);
        assert_eq!(event.kind, AlarmKind::AboveHigh);
        assert!(event.offline);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn calibrated_value_is_not_offline() {
        let sink = RecordingSink::default();
        let event = evaluate_alarm(CurrentGlucose::Calibrated(60), &AlarmThresholds::default(), &sink)
            .expect("alarm should fire");
        assert_eq!(event.kind, AlarmKind::BelowLow);
        assert!(!event.offline);
    }

    #[test]
    fn unknown_glucose_never_alarms() {
        let sink = RecordingSink::default();
        assert!(evaluate_alarm(CurrentGlucose::Unknown, &AlarmThresholds::default(), &sink).is_none());
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn decodes_service_classifications() {
        let alarm: AlarmClass = serde_json::from_str("\"PROJECTED_LOW_GLUCOSE\"").unwrap();
        assert_eq!(alarm, AlarmClass::ProjectedLow);
        let alarm: AlarmClass = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(alarm, AlarmClass::NotDetermined);
        let trend: TrendClass = serde_json::from_str("\"RISING_QUICKLY\"").unwrap();
        assert_eq!(trend, TrendClass::RisingQuickly);
    }
}
