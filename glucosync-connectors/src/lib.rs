//! HTTP Connectors for the GlucoSync Pipeline
//!
//! ## Overview
//!
//! `glucosync-core` talks to its remote collaborators only through the
//! `CalibrationService` and `EntryStore` traits. This crate provides the
//! network implementations:
//!
//! | Module       | Implements           | Remote                              |
//! |--------------|----------------------|-------------------------------------|
//! | `oop`        | `CalibrationService` | online calibration server           |
//! | `nightscout` | `EntryStore`         | Nightscout-compatible entries API   |
//! | `http`       | (shared transport)   | ureq agent, `api-secret`, status map |
//!
//! ## Failure Mapping
//!
//! Every call returns `RemoteError`:
//!
//! - transport failures, timeouts and non-401 error statuses → `Transport`
//! - a 401 → `Unauthorized`
//! - a body that does not parse → `Decode`
//! - a body carrying `errcode` → `DataQuality`
//!
//! Nothing is retried here. A failed call degrades the current cycle and
//! the next cycle tries again.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use glucosync_connectors::{CalibrationServerConfig, EntryStoreConfig, NightscoutClient, OopClient};
//! use glucosync_core::{OwnedState, Pipeline, StateOwner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let oop = OopClient::new(CalibrationServerConfig {
//!     site_url: "https://oop.example.com".into(),
//!     token: "access-token".into(),
//!     ..Default::default()
//! })?;
//! let nightscout = NightscoutClient::new(&EntryStoreConfig {
//!     site_url: "https://ns.example.com".into(),
//!     token: "api-secret".into(),
//!     ..Default::default()
//! })?;
//!
//! let owner = StateOwner::spawn(OwnedState::default());
//! let pipeline = Pipeline::builder(Arc::new(oop))
//!     .entry_store(Arc::new(nightscout))
//!     .build(owner.handle())?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;
pub mod nightscout;
pub mod oop;

pub use config::{load_sensor_read, AppConfig, LoadError};
pub use http::{HttpConfig, HttpConnector, HttpError};
pub use nightscout::{EntryStoreConfig, NightscoutClient};
pub use oop::{CalibrationServerConfig, OopClient};

/// Request counters kept by each connector
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Requests that got a success status
    pub requests_sent: u64,
    /// Requests that failed for any reason
    pub requests_failed: u64,
    /// Request body bytes sent successfully
    pub bytes_sent: u64,
    /// Last error message
    pub last_error: Option<String>,
}
