//! Nightscout-style time-series store client
//!
//! Entries go to `api/v1/entries` as `sgv` records. Every request carries
//! the SHA-1 of the shared token in the `api-secret` header.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use glucosync_core::{EntryStore, Reading, ReadingId, RemoteError, RemoteResult};

use crate::http::{HttpConfig, HttpConnector, HttpError};

const ENTRIES: &str = "api/v1/entries";
const ENTRIES_JSON: &str = "api/v1/entries.json";

/// Entry store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryStoreConfig {
    /// Base URL of the site
    pub site_url: String,
    /// Shared token; hashed before it leaves the process
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for EntryStoreConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Wire form of one uploaded entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SgvEntry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub date_string: String,
    pub date: i64,
    pub sgv: i32,
    pub device: String,
}

impl From<&Reading> for SgvEntry {
    fn from(reading: &Reading) -> Self {
        Self {
            kind: "sgv",
            date_string: reading.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            date: reading.epoch_millis(),
            sgv: reading.value,
            device: reading.source.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StoredEntry {
    sgv: Option<i32>,
    date: Option<i64>,
    device: Option<String>,
}

/// Parse a read-back body, skipping records that are not complete `sgv` entries
pub fn parse_entries(body: &str) -> RemoteResult<Vec<Reading>> {
    let records: Vec<StoredEntry> =
        serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;

    Ok(records
        .into_iter()
        .filter_map(|record| {
            let (value, millis, device) = (record.sgv?, record.date?, record.device?);
            let timestamp: DateTime<Utc> = Utc.timestamp_millis_opt(millis).single()?;
            Some(Reading::new(ReadingId(millis), value, timestamp, device))
        })
        .collect())
}

/// Client for a Nightscout site
pub struct NightscoutClient {
    http: HttpConnector,
}

impl NightscoutClient {
    pub fn new(config: &EntryStoreConfig) -> Result<Self, HttpError> {
        let mut http_config = HttpConfig::new(&config.site_url).timeout_secs(config.timeout_secs);
        if !config.token.is_empty() {
            http_config = http_config.api_secret(&config.token);
        }
        Ok(Self {
            http: HttpConnector::new(http_config)?,
        })
    }

    pub fn http(&self) -> &HttpConnector {
        &self.http
    }
}

fn log_failure(method: &str, err: &HttpError) {
    match err {
        HttpError::Auth(_) => warn!("Nightscout: {method} not authorized"),
        other => warn!("Nightscout: {method} failed: {other}"),
    }
}

#[async_trait]
impl EntryStore for NightscoutClient {
    async fn delete_entries(&self, device_tag: &str, count: usize) -> RemoteResult<()> {
        let query = [("find[device]", device_tag.to_string()), ("count", count.to_string())];
        let body = self.http.delete(ENTRIES, &query).await.map_err(|e| {
            log_failure("DELETE", &e);
            RemoteError::from(e)
        })?;
        debug!("Nightscout: delete success: {body}");
        Ok(())
    }

    async fn post_entries(&self, entries: &[Reading]) -> RemoteResult<()> {
        let payload: Vec<SgvEntry> = entries.iter().map(SgvEntry::from).collect();
        let body = self.http.post_json(ENTRIES, &payload).await.map_err(|e| {
            log_failure("POST", &e);
            RemoteError::from(e)
        })?;
        info!("Nightscout: posted {} entries", payload.len());
        debug!("Nightscout: post success: {body}");
        Ok(())
    }

    async fn read_entries(&self, count: usize) -> RemoteResult<Vec<Reading>> {
        let body = self.http.get(ENTRIES_JSON, &[("count", count.to_string())]).await?;
        let entries = parse_entries(&body)?;
        debug!("Nightscout: read {} entries", entries.len());
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "Nightscout"
    }
}
