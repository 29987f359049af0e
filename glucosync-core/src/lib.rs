//! Reconciliation core for GlucoSync
//!
//! Turns periodic glucose-sensor reads into one consistent, deduplicated,
//! most-recent-first glucose series:
//!
//! ```text
//! sensor read → calibration service → history reconciliation
//!             → calibration re-application → alarm → time-series sync
//! ```
//!
//! Every stage degrades to a defined, non-empty result when its remote
//! collaborator fails. Only the state owner mutates the canonical state;
//! readers take immutable snapshots.
//!
//! Network implementations of [`CalibrationService`] and [`EntryStore`] live
//! in `glucosync-connectors`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use glucosync_core::{OwnedState, Pipeline, StateOwner, CalibrationService, SensorRead};
//!
//! # async fn example(service: Arc<dyn CalibrationService>, read: SensorRead) -> Result<(), Box<dyn std::error::Error>> {
//! let owner = StateOwner::spawn(OwnedState::default());
//! let mut pipeline = Pipeline::builder(service).build(owner.handle())?;
//!
//! let report = pipeline.run_cycle(read).await?;
//! println!("current glucose: {}", report.current_glucose.signed());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod alarm;
pub mod calibration;
pub mod config;
pub mod errors;
pub mod identity;
pub mod notices;
pub mod pipeline;
pub mod reading;
pub mod reconcile;
pub mod snapshot;
pub mod state;
pub mod sync;
pub mod traits;

// Public API
pub use alarm::{AlarmClass, AlarmEvent, AlarmKind, AlarmSink, AlarmThresholds, LogAlarmSink, TrendClass};
pub use calibration::{CalibrationParameters, CurrentGlucose};
pub use config::{PipelineConfig, SyncConfig};
pub use errors::{ConfigError, PipelineError, RemoteError, RemoteResult, SnapshotError};
pub use identity::{IdentifierCache, IdentifierResolution, SensorIdentifiers};
pub use notices::{Notice, NoticeBoard};
pub use pipeline::{CallOutcome, CycleReport, CycleStage, Pipeline, PipelineBuilder};
pub use reading::{Reading, ReadingId, SENTINEL_VALUE};
pub use snapshot::{SensorRead, SensorSnapshot};
pub use state::{CanonicalState, OwnedState, StateHandle, StateOwner};
pub use sync::{SyncOutcome, SyncPlan};
pub use traits::{CalibrationRequest, CalibrationService, CorrectedHistory, EntryStore, HistoryRequest};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
