//! File-based configuration for the `glucosync` binary

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use glucosync_core::{ConfigError, PipelineConfig, SensorRead};

use crate::nightscout::EntryStoreConfig;
use crate::oop::CalibrationServerConfig;

/// Errors raised while loading configuration or recorded reads
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Everything one run needs besides the sensor read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub calibration_server: CalibrationServerConfig,
    /// Sync is skipped when absent
    pub entry_store: Option<EntryStoreConfig>,
}

impl AppConfig {
    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let config: Self = read_json(path.as_ref())?;
        config.pipeline.validate()?;
        Ok(config)
    }
}

/// Load a recorded sensor read
pub fn load_sensor_read(path: impl AsRef<Path>) -> Result<SensorRead, LoadError> {
    read_json(path.as_ref())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_config() {
        let file = write(
            r#"{
                "pipeline": {"alarm": {"high": 180, "low": 80}, "sync": {"source_tag": "phone"}},
                "calibration_server": {"site_url": "https://oop.example.com", "token": "t"},
                "entry_store": {"site_url": "https://ns.example.com", "token": "secret"}
            }"#,
        );
        let config = AppConfig::load(file.path()).unwrap();

        assert_eq!(config.pipeline.alarm.high, 180);
        assert_eq!(config.pipeline.sync.source_tag, "phone");
        assert_eq!(config.pipeline.sync.delete_count, 32);
        assert_eq!(config.calibration_server.history_endpoint, "libreoop2");
        assert_eq!(config.entry_store.unwrap().token, "secret");
    }

    #[test]
    fn entry_store_is_optional() {
        let file = write(r#"{"calibration_server": {"site_url": "https://oop.example.com"}}"#);
        let config = AppConfig::load(file.path()).unwrap();
        assert!(config.entry_store.is_none());
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let file = write(r#"{"pipeline": {"alarm": {"high": 70, "low": 200}}}"#);
        assert!(matches!(AppConfig::load(file.path()), Err(LoadError::Invalid(_))));
    }

    #[test]
    fn reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppConfig::load(dir.path().join("missing.json")),
            Err(LoadError::Io { .. })
        ));

        let file = write("{ not json");
        assert!(matches!(load_sensor_read(file.path()), Err(LoadError::Parse { .. })));
    }

    #[test]
    fn loads_recorded_read() {
        let file = write(
            r#"{
                "snapshot": {
                    "raw_memory": [1, 2, 3],
                    "age_minutes": 6000,
                    "last_reading_time": "2023-11-14T22:13:20Z"
                },
                "trend": [{"id": 6000, "value": 1500, "timestamp": "2023-11-14T22:13:20Z"}],
                "history": []
            }"#,
        );
        let read = load_sensor_read(file.path()).unwrap();
        assert_eq!(read.snapshot.age_minutes, 6000);
        assert!(read.snapshot.device_uid.is_empty());
        assert_eq!(read.trend[0].value, 1500);
        assert!(read.validate().is_ok());
    }
}
