//! Remote calibration service client
//!
//! Posts the raw sensor memory to an online calibration server and decodes
//! two kinds of answer:
//!
//! - calibration parameters for the temperature-compensated linear model
//! - a corrected history with a real-time value and the server's alarm and
//!   trend classifications
//!
//! A history body mentioning `errcode` is the server's way of saying the
//! input was rejected; it surfaces as `RemoteError::DataQuality` carrying
//! the body text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use glucosync_core::reading::{sensor_minute_timestamp, values};
use glucosync_core::{
    AlarmClass, CalibrationParameters, CalibrationRequest, CalibrationService, CorrectedHistory,
    HistoryRequest, Reading, ReadingId, RemoteError, RemoteResult, TrendClass,
};

use crate::http::{HttpConfig, HttpConnector, HttpError};

const SOURCE: &str = "oop";

/// Calibration server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationServerConfig {
    /// Base URL of the server
    pub site_url: String,
    /// Access token sent with every request
    pub token: String,
    pub calibration_endpoint: String,
    pub history_endpoint: String,
    pub timeout_secs: u64,
}

impl Default for CalibrationServerConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            token: String::new(),
            calibration_endpoint: "calibrateSensor".into(),
            history_endpoint: "libreoop2".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CalibrationResponse {
    #[serde(alias = "parameters")]
    slope: Option<SlopeParameters>,
}

#[derive(Debug, Deserialize)]
struct SlopeParameters {
    #[serde(alias = "slopeSlope")]
    slope_slope: f64,
    #[serde(alias = "slopeOffset")]
    slope_offset: f64,
    #[serde(alias = "offsetOffset")]
    offset_offset: f64,
    #[serde(alias = "offsetSlope")]
    offset_slope: f64,
}

impl From<SlopeParameters> for CalibrationParameters {
    fn from(p: SlopeParameters) -> Self {
        Self {
            slope_slope: p.slope_slope,
            slope_offset: p.slope_offset,
            offset_offset: p.offset_offset,
            offset_slope: p.offset_slope,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServerGlucose {
    id: u32,
    value: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    real_time_glucose: Option<ServerGlucose>,
    #[serde(default)]
    historic_glucose: Vec<ServerGlucose>,
    #[serde(default)]
    alarm: AlarmClass,
    #[serde(default)]
    trend_arrow: TrendClass,
}

/// Decode a calibration answer
pub fn decode_calibration(body: &str) -> RemoteResult<CalibrationParameters> {
    let response: CalibrationResponse =
        serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;
    match response.slope {
        Some(params) => Ok(params.into()),
        None if body.contains("errcode") => Err(RemoteError::DataQuality(body.to_string())),
        None => Err(RemoteError::Decode("missing calibration parameters".into())),
    }
}

/// Decode a history answer, dating entries from the sensor minute index
///
/// The result is most recent first whatever order the server used.
pub fn decode_history(
    body: &str,
    captured_at: DateTime<Utc>,
    sensor_age_minutes: u32,
) -> RemoteResult<CorrectedHistory> {
    if body.contains("errcode") {
        return Err(RemoteError::DataQuality(body.to_string()));
    }
    let response: HistoryResponse =
        serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;

    let mut series: Vec<Reading> = response
        .historic_glucose
        .iter()
        .map(|g| {
            Reading::new(
                ReadingId::from_sensor_minute(g.id),
                g.value,
                sensor_minute_timestamp(captured_at, sensor_age_minutes, g.id),
                SOURCE,
            )
        })
        .collect();
    if let (Some(first), Some(last)) = (series.first(), series.last()) {
        if first.id < last.id {
            series.reverse();
        }
    }

    Ok(CorrectedHistory {
        values: series,
        real_time_glucose: response.real_time_glucose.map(|g| g.value),
        alarm: response.alarm,
        trend: response.trend_arrow,
    })
}

/// Client for the online calibration server
pub struct OopClient {
    http: HttpConnector,
    config: CalibrationServerConfig,
}

impl OopClient {
    pub fn new(config: CalibrationServerConfig) -> Result<Self, HttpError> {
        if config.token.is_empty() {
            return Err(HttpError::Config("calibration server token is empty".into()));
        }
        let http = HttpConnector::new(HttpConfig::new(&config.site_url).timeout_secs(config.timeout_secs))?;
        Ok(Self { http, config })
    }

    fn base_fields(&self, raw_memory: &[u8], captured_at: DateTime<Utc>) -> Vec<(&'static str, String)> {
        vec![
            ("accesstoken", self.config.token.clone()),
            ("content", hex::encode(raw_memory)),
            ("timestamp", captured_at.timestamp_millis().to_string()),
        ]
    }
}

#[async_trait]
impl CalibrationService for OopClient {
    async fn calibration(&self, request: &CalibrationRequest) -> RemoteResult<CalibrationParameters> {
        info!("sending sensor data to {}", self.http.url(&self.config.calibration_endpoint));
        let fields = self.base_fields(&request.raw_memory, request.captured_at);
        let body = self.http.post_form(&self.config.calibration_endpoint, &fields).await?;
        debug!("calibration response: {body}");
        decode_calibration(&body)
    }

    async fn history(&self, request: &HistoryRequest) -> RemoteResult<CorrectedHistory> {
        info!("sending sensor data to {}", self.http.url(&self.config.history_endpoint));
        let mut fields = self.base_fields(&request.raw_memory, request.captured_at);
        fields.push(("patchUid", hex::encode(&request.device_uid)));
        fields.push(("patchInfo", hex::encode(&request.patch_info)));

        let body = self.http.post_form(&self.config.history_endpoint, &fields).await?;
        debug!("history response: {body}");
        let history = decode_history(&body, request.captured_at, request.sensor_age_minutes)?;
        debug!("history values: {:?}", values(&history.values));
        Ok(history)
    }

    fn name(&self) -> &'static str {
        "LibreOOP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn captured_at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn decodes_calibration_parameters() {
        let body = r#"{"errcode":0,"slope":{"slope_slope":0.00001,"slope_offset":-0.0002,"offset_offset":-20.5,"offset_slope":0.11}}"#;
        let params = decode_calibration(body).unwrap();
        assert_eq!(params.offset_offset, -20.5);
        assert_eq!(params.offset_slope, 0.11);
    }

    #[test]
    fn accepts_camel_case_parameters() {
        let body = r#"{"parameters":{"slopeSlope":0.0,"slopeOffset":0.0,"offsetOffset":-10.0,"offsetSlope":0.1}}"#;
        assert_eq!(decode_calibration(body).unwrap().offset_offset, -10.0);
    }

    #[test]
    fn calibration_without_parameters_fails() {
        assert!(matches!(
            decode_calibration(r#"{"errcode":4}"#),
            Err(RemoteError::DataQuality(_))
        ));
        assert!(matches!(decode_calibration("{}"), Err(RemoteError::Decode(_))));
        assert!(matches!(decode_calibration("<html>"), Err(RemoteError::Decode(_))));
    }

    #[test]
    fn decodes_history_newest_first() {
        let body = r#"{
            "realTimeGlucose": {"id": 6000, "value": 131},
            "historicGlucose": [
                {"id": 5970, "value": 120},
                {"id": 5985, "value": 125},
                {"id": 6000, "value": 0}
            ],
            "alarm": "GLUCOSE_OK",
            "trendArrow": "RISING"
        }"#;
        let history = decode_history(body, captured_at(), 6000).unwrap();

        assert_eq!(values(&history.values), vec![0, 125, 120]);
        assert_eq!(history.values[0].id, ReadingId(6000));
        assert_eq!(history.values[0].timestamp, captured_at());
        assert_eq!(history.values[2].timestamp, captured_at() - Duration::minutes(30));
        assert_eq!(history.real_time_glucose, Some(131));
        assert_eq!(history.alarm, AlarmClass::InRange);
        assert_eq!(history.trend, TrendClass::Rising);
    }

    #[test]
    fn unknown_classifications_are_not_determined() {
        let body = r#"{"historicGlucose": [], "alarm": "SOMETHING_NEW", "trendArrow": "SIDEWAYS"}"#;
        let history = decode_history(body, captured_at(), 100).unwrap();
        assert!(history.values.is_empty());
        assert_eq!(history.real_time_glucose, None);
        assert_eq!(history.alarm, AlarmClass::NotDetermined);
        assert_eq!(history.trend, TrendClass::NotDetermined);
    }

    #[test]
    fn errcode_body_is_data_quality() {
        let body = r#"{"errcode":5,"msg":"invalid patchInfo"}"#;
        assert_eq!(
            decode_history(body, captured_at(), 100),
            Err(RemoteError::DataQuality(body.to_string()))
        );
    }

    #[test]
    fn client_requires_token_and_url() {
        assert!(OopClient::new(CalibrationServerConfig::default()).is_err());

        let config = CalibrationServerConfig {
            site_url: "https://oop.example.com".into(),
            token: "token".into(),
            ..Default::default()
        };
        let client = OopClient::new(config).unwrap();
        assert_eq!(client.name(), "LibreOOP");
    }
}
