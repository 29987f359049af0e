//! Calibration parameters and their application to raw series
//!
//! The calibration service owns the algorithm; this module only evaluates
//! the temperature-compensated linear model it returns:
//!
//! ```text
//! slope  = slope_slope  * T + offset_slope
//! offset = slope_offset * T + offset_offset
//! value  = round(raw * slope + offset)
//! ```
//!
//! A zero `offset_offset` means no calibration has ever been received, so
//! parameters are only applied when that term is non-zero.

use serde::{Deserialize, Serialize};

use crate::reading::Reading;

/// Linear correction returned by the calibration service
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationParameters {
    /// Temperature coefficient of the slope
    pub slope_slope: f64,
    /// Temperature coefficient of the offset
    pub slope_offset: f64,
    /// Constant term of the offset; zero means "never calibrated"
    pub offset_offset: f64,
    /// Constant term of the slope
    pub offset_slope: f64,
}

impl CalibrationParameters {
    /// Parameters carry a real calibration
    pub fn is_usable(&self) -> bool {
        self.offset_offset != 0.0
    }

    /// Corrected value for a raw value at a raw temperature
    pub fn evaluate(&self, raw_value: i32, raw_temperature: i32) -> i32 {
        let temperature = f64::from(raw_temperature);
        let slope = self.slope_slope * temperature + self.offset_slope;
        let offset = self.slope_offset * temperature + self.offset_offset;
        (f64::from(raw_value) * slope + offset).round() as i32
    }

    /// Calibrated copy of a reading
    pub fn apply(&self, reading: &Reading) -> Reading {
        Reading {
            value: self.evaluate(reading.value, reading.raw_temperature),
            ..reading.clone()
        }
    }

    /// Calibrated copy of a series, same length and order
    pub fn apply_series(&self, series: &[Reading]) -> Vec<Reading> {
        series.iter().map(|r| self.apply(r)).collect()
    }
}

/// The single "current glucose" scalar and where it came from
///
/// Locally derived values export with a negative sign, values reported by
/// the calibration service in real time export positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "origin", content = "value", rename_all = "snake_case")]
pub enum CurrentGlucose {
    /// No reading yet
    #[default]
    Unknown,
    /// Latest raw trend value; no calibration has been received
    Raw(i32),
    /// Latest trend value after applying the known calibration
    Calibrated(i32),
    /// Real-time value reported by the calibration service
    Online(i32),
}

impl CurrentGlucose {
    /// Signed export value: negative when derived locally
    pub const fn signed(&self) -> i32 {
        match *self {
            CurrentGlucose::Unknown => 0,
            CurrentGlucose::Raw(v) | CurrentGlucose::Calibrated(v) => v.saturating_neg(),
            CurrentGlucose::Online(v) => v,
        }
    }

    /// Magnitude used for alarms and uploads
    pub const fn magnitude(&self) -> i32 {
        match *self {
            CurrentGlucose::Unknown => 0,
            CurrentGlucose::Raw(v) | CurrentGlucose::Calibrated(v) | CurrentGlucose::Online(v) => {
                v.saturating_abs()
            }
        }
    }

    /// Raw fallback: no calibration has ever been received
    pub const fn is_offline(&self) -> bool {
        matches!(self, CurrentGlucose::Raw(_))
    }

    /// Value was derived locally rather than reported by the calibration service
    pub const fn is_local(&self) -> bool {
        matches!(self, CurrentGlucose::Raw(_) | CurrentGlucose::Calibrated(_))
    }

    /// Origin label for logs
    pub const fn origin(&self) -> &'static str {
        match self {
            CurrentGlucose::Unknown => "unknown",
            CurrentGlucose::Raw(_) => "offline",
            CurrentGlucose::Calibrated(_) => "calibrated",
            CurrentGlucose::Online(_) => "online",
        }
    }
}

/// Output of re-applying the best-known calibration to one cycle's raw data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Recalibration {
    /// Calibrated trend, empty when no usable calibration is known
    pub trend: Vec<Reading>,
    /// Calibrated history, empty when no usable calibration is known
    pub history: Vec<Reading>,
    /// Current glucose recomputed from this cycle's trend
    pub current: CurrentGlucose,
}

/// Re-apply `latest` to this cycle's raw series
///
/// Runs on every cycle whether or not the calibration call succeeded, so the
/// current glucose always reflects the newest raw trend.
pub fn recalibrate(
    latest: Option<&CalibrationParameters>,
    raw_trend: &[Reading],
    raw_history: &[Reading],
) -> Recalibration {
    match latest.filter(|p| p.is_usable()) {
        Some(params) => {
            let trend = params.apply_series(raw_trend);
            let current = trend
                .first()
                .map_or(CurrentGlucose::Unknown, |r| CurrentGlucose::Calibrated(r.value));
            Recalibration {
                trend,
                history: params.apply_series(raw_history),
                current,
            }
        }
        None => Recalibration {
            trend: Vec::new(),
            history: Vec::new(),
            current: raw_trend
                .first()
                .map_or(CurrentGlucose::Unknown, |r| CurrentGlucose::Raw(r.value)),
        },
    }
}
