//! Reconciliation Cycle Pipeline
//!
//! ## Overview
//!
//! One cycle takes a sensor read from the transport and leaves the canonical
//! state reconciled, evaluated and synced. It runs as a fixed, ordered list
//! of stages over a single cycle-scoped context:
//!
//! ```text
//! Intake → RemoteCalls → ApplyCalibration → ReconcileHistory → EvaluateAlarm → Sync
//!   │          │               │                  │                 │           │
//! backfill  calibration   re-apply best-      corrected or       threshold   delete →
//! ids, raw  ∥ history     known params        cleared history    check       post → read
//! ```
//!
//! ## Concurrency
//!
//! The two calibration-service calls are issued together and may complete
//! in either order. Their results are applied on the state owner in a fixed
//! order (calibration, then history) so a real-time value from the history
//! call always wins over the locally recomputed one. Every stage that
//! touches the canonical state does so through [`StateHandle::update`].
//!
//! `run_cycle` takes `&mut self`, so a pipeline cannot run two cycles at
//! once.
//!
//! ## Degradation
//!
//! No remote failure aborts a cycle. A failed calibration call still
//! re-applies the last known parameters, a failed history call clears the
//! canonical history, and sync failures are logged. Each one also posts a
//! notice.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::alarm::{evaluate_alarm, AlarmEvent, AlarmSink, LogAlarmSink};
use crate::calibration::{recalibrate, CalibrationParameters, CurrentGlucose};
use crate::config::{PipelineConfig, SyncConfig};
use crate::errors::{ConfigError, PipelineError, RemoteError, RemoteResult};
use crate::identity::IdentifierResolution;
use crate::notices::Notice;
use crate::reading::{values, Reading};
use crate::reconcile::reconcile_history;
use crate::snapshot::{SensorRead, SensorSnapshot};
use crate::state::{CanonicalState, StateHandle};
use crate::sync::{run_sync, SyncOutcome, SyncPlan};
use crate::traits::{CalibrationRequest, CalibrationService, CorrectedHistory, EntryStore, HistoryRequest};

/// Stages of a reconciliation cycle, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    /// Backfill identifiers, store the raw series
    Intake,
    /// Issue the calibration and history calls
    RemoteCalls,
    /// Re-apply the best-known calibration
    ApplyCalibration,
    /// Reconcile or clear the canonical history
    ReconcileHistory,
    /// Compare the current glucose against the thresholds
    EvaluateAlarm,
    /// Resync the remote time-series store
    Sync,
}

impl CycleStage {
    /// Every stage, in the order a cycle runs them
    pub const ORDER: [CycleStage; 6] = [
        CycleStage::Intake,
        CycleStage::RemoteCalls,
        CycleStage::ApplyCalibration,
        CycleStage::ReconcileHistory,
        CycleStage::EvaluateAlarm,
        CycleStage::Sync,
    ];

    /// Stage name for logs
    pub const fn name(&self) -> &'static str {
        match self {
            CycleStage::Intake => "intake",
            CycleStage::RemoteCalls => "remote-calls",
            CycleStage::ApplyCalibration => "apply-calibration",
            CycleStage::ReconcileHistory => "reconcile-history",
            CycleStage::EvaluateAlarm => "evaluate-alarm",
            CycleStage::Sync => "sync",
        }
    }
}

/// How a remote call went
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallOutcome {
    /// Not issued this cycle
    #[default]
    Skipped,
    /// Response applied
    Succeeded,
    /// Failed; the degraded path ran instead
    Failed(RemoteError),
}

/// Everything a cycle did, returned to the caller
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleReport {
    /// How identifiers were obtained; `None` until intake ran
    pub identifiers: Option<IdentifierResolution>,
    /// Calibration call
    pub calibration: CallOutcome,
    /// History call
    pub history: CallOutcome,
    /// Length of the canonical history after reconciliation
    pub history_len: usize,
    /// Leading skewed slot dropped from the corrected history
    pub history_trimmed: bool,
    /// Sentinel slots appended to the corrected history
    pub history_padded: usize,
    /// Current glucose the alarm was evaluated against
    pub current_glucose: CurrentGlucose,
    /// Alarm fired this cycle
    pub alarm: Option<AlarmEvent>,
    /// Sync steps; `None` when sync did not run
    pub sync: Option<SyncOutcome>,
    /// Stages completed, in order
    pub stages: Vec<CycleStage>,
}

/// Cycle-scoped context threaded through every stage
struct Cycle {
    snapshot: SensorSnapshot,
    trend: Vec<Reading>,
    history: Vec<Reading>,
    calibration_result: Option<RemoteResult<CalibrationParameters>>,
    history_result: Option<RemoteResult<CorrectedHistory>>,
    report: CycleReport,
}

impl Cycle {
    fn new(read: SensorRead) -> Self {
        Self {
            snapshot: read.snapshot,
            trend: read.trend,
            history: read.history,
            calibration_result: None,
            history_result: None,
            report: CycleReport::default(),
        }
    }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    config: PipelineConfig,
    calibration: Arc<dyn CalibrationService>,
    store: Option<Arc<dyn EntryStore>>,
    alarm: Arc<dyn AlarmSink>,
}

impl PipelineBuilder {
    /// Pipeline settings
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Remote time-series store; without one the sync stage is skipped
    pub fn entry_store(mut self, store: Arc<dyn EntryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Side effect run when an alarm fires
    pub fn alarm_sink(mut self, sink: Arc<dyn AlarmSink>) -> Self {
        self.alarm = sink;
        self
    }

    /// Validate the configuration and attach to the state owner
    pub fn build(self, state: StateHandle) -> Result<Pipeline, ConfigError> {
        self.config.validate()?;
        Ok(Pipeline {
            config: self.config,
            state,
            calibration: self.calibration,
            store: self.store,
            alarm: self.alarm,
        })
    }
}

/// Runs reconciliation cycles against the canonical state
pub struct Pipeline {
    config: PipelineConfig,
    state: StateHandle,
    calibration: Arc<dyn CalibrationService>,
    store: Option<Arc<dyn EntryStore>>,
    alarm: Arc<dyn AlarmSink>,
}

impl Pipeline {
    /// Start building a pipeline around a calibration service
    pub fn builder(calibration: Arc<dyn CalibrationService>) -> PipelineBuilder {
        PipelineBuilder {
            config: PipelineConfig::default(),
            calibration,
            store: None,
            alarm: Arc::new(LogAlarmSink),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle to the canonical state
    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// Run one full reconciliation cycle
    ///
    /// Only a malformed read or a stopped state owner return `Err`; remote
    /// failures are reported in the [`CycleReport`].
    pub async fn run_cycle(&mut self, read: SensorRead) -> Result<CycleReport, PipelineError> {
        read.validate()?;
        let mut cycle = Cycle::new(read);

        for stage in CycleStage::ORDER {
            debug!("cycle stage: {}", stage.name());
            self.run_stage(stage, &mut cycle).await?;
            cycle.report.stages.push(stage);
        }

        self.state.update(|s| s.canonical.cycles += 1).await?;
        info!(
            "cycle complete: current glucose {} ({})",
            cycle.report.current_glucose.signed(),
            cycle.report.current_glucose.origin()
        );
        Ok(cycle.report)
    }

    /// Seed the remote mirror from the entry store outside of a cycle
    ///
    /// Returns how many entries the store returned, or `None` when no store
    /// is configured or the read failed. An empty read leaves the mirror
    /// untouched.
    pub async fn refresh_remote_mirror(&self) -> Result<Option<usize>, PipelineError> {
        let Some(store) = self.store.as_deref() else {
            return Ok(None);
        };

        let entries = match store.read_entries(self.config.sync.read_count).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("{}: initial read failed: {e}", store.name());
                return Ok(None);
            }
        };
        let count = entries.len();
        if count > 0 {
            self.state.update(move |s| s.canonical.remote_entries = entries).await?;
        }
        info!("{}: mirrored {count} remote entries", store.name());
        Ok(Some(count))
    }

    async fn run_stage(&self, stage: CycleStage, cycle: &mut Cycle) -> Result<(), PipelineError> {
        match stage {
            CycleStage::Intake => self.intake(cycle).await,
            CycleStage::RemoteCalls => {
                self.remote_calls(cycle).await;
                Ok(())
            }
            CycleStage::ApplyCalibration => self.apply_calibration(cycle).await,
            CycleStage::ReconcileHistory => self.reconcile(cycle).await,
            CycleStage::EvaluateAlarm => self.evaluate(cycle).await,
            CycleStage::Sync => self.sync(cycle).await,
        }
    }

    async fn intake(&self, cycle: &mut Cycle) -> Result<(), PipelineError> {
        info!("raw trend: {:?}", values(&cycle.trend));
        info!("raw history: {:?}", values(&cycle.history));

        let mut snapshot = cycle.snapshot.clone();
        let trend = cycle.trend.clone();
        let history = cycle.history.clone();
        let (snapshot, resolution) = self
            .state
            .update(move |s| {
                let resolution = s.identifiers.resolve(&mut snapshot);
                let canonical = &mut s.canonical;
                canonical.current_glucose = trend
                    .first()
                    .map_or(CurrentGlucose::Unknown, |r| CurrentGlucose::Raw(r.value));
                canonical.raw_trend = trend;
                canonical.raw_history = history;
                (snapshot, resolution)
            })
            .await?;

        debug!("sensor identifiers: {:?}", resolution);
        cycle.snapshot = snapshot;
        cycle.report.identifiers = Some(resolution);
        Ok(())
    }

    async fn remote_calls(&self, cycle: &mut Cycle) {
        let service = self.calibration.as_ref();
        let calibration_request = CalibrationRequest::from_snapshot(&cycle.snapshot);
        let history_request = cycle
            .report
            .identifiers
            .filter(IdentifierResolution::is_resolved)
            .and_then(|_| HistoryRequest::from_snapshot(&cycle.snapshot));

        info!("sending sensor data to {}", service.name());
        let (calibration, history) = tokio::join!(service.calibration(&calibration_request), async {
            match &history_request {
                Some(request) => Some(service.history(request).await),
                None => None,
            }
        });

        if history.is_none() {
            debug!("history call skipped: sensor identifiers unavailable");
        }
        cycle.calibration_result = Some(calibration);
        cycle.history_result = history;
    }

    async fn apply_calibration(&self, cycle: &mut Cycle) -> Result<(), PipelineError> {
        let result = cycle.calibration_result.take();
        let name = self.calibration.name();

        let (outcome, current) = self
            .state
            .update(move |s| {
                let canonical = &mut s.canonical;
                let outcome = match result {
                    Some(Ok(params)) => {
                        info!("{name}: calibration parameters: {params:?}");
                        canonical.calibration = Some(params);
                        CallOutcome::Succeeded
                    }
                    Some(Err(e)) => {
                        warn!("{name}: calibration failed: {e}");
                        canonical.notify(Notice::append(format!("{name}: calibration failed ({})", e.kind())));
                        CallOutcome::Failed(e)
                    }
                    None => CallOutcome::Skipped,
                };

                // Reapply even when the call failed so the value tracks this cycle's raw trend
                let recalibrated =
                    recalibrate(canonical.calibration.as_ref(), &canonical.raw_trend, &canonical.raw_history);
                canonical.calibrated_trend = recalibrated.trend;
                canonical.calibrated_history = recalibrated.history;
                canonical.current_glucose = recalibrated.current;
                (outcome, recalibrated.current)
            })
            .await?;

        cycle.report.calibration = outcome;
        cycle.report.current_glucose = current;
        Ok(())
    }

    async fn reconcile(&self, cycle: &mut Cycle) -> Result<(), PipelineError> {
        let result = cycle.history_result.take();
        let raw_history = cycle.history.clone();
        let capacity = self.config.history_capacity;
        let name = self.calibration.name();

        let (outcome, reconciled, current) = self
            .state
            .update(move |s| {
                let canonical = &mut s.canonical;
                let (outcome, corrected) = match result {
                    Some(Ok(response)) => {
                        canonical.alarm = response.alarm;
                        canonical.trend = response.trend;
                        if let Some(real_time) = response.real_time_glucose.filter(|v| *v > 0) {
                            canonical.current_glucose = CurrentGlucose::Online(real_time);
                        }
                        (CallOutcome::Succeeded, Some(response.values))
                    }
                    Some(Err(e)) => {
                        warn!("{name}: history failed: {e}");
                        let notice = match &e {
                            RemoteError::DataQuality(body) => Notice::replace(body.clone()),
                            other => Notice::append(format!("{name}: {}", other.kind())),
                        };
                        canonical.notify(notice);
                        (CallOutcome::Failed(e), None)
                    }
                    None => (CallOutcome::Skipped, None),
                };

                let reconciled = reconcile_history(corrected, &raw_history, capacity);
                info!("{name}: history values: {:?}", values(&reconciled.history));
                canonical.history = reconciled.history.clone();
                (outcome, reconciled, canonical.current_glucose)
            })
            .await?;

        cycle.report.history = outcome;
        cycle.report.history_len = reconciled.history.len();
        cycle.report.history_trimmed = reconciled.trimmed;
        cycle.report.history_padded = reconciled.padded;
        cycle.report.current_glucose = current;
        Ok(())
    }

    async fn evaluate(&self, cycle: &mut Cycle) -> Result<(), PipelineError> {
        let current = self.state.update(|s| s.canonical.current_glucose).await?;
        cycle.report.current_glucose = current;
        cycle.report.alarm = evaluate_alarm(current, &self.config.alarm, self.alarm.as_ref());
        Ok(())
    }

    async fn sync(&self, cycle: &mut Cycle) -> Result<(), PipelineError> {
        let Some(store) = self.store.as_deref() else {
            debug!("no entry store configured, skipping sync");
            return Ok(());
        };

        let captured_at = cycle.snapshot.last_reading_time;
        let sync_config = self.config.sync.clone();
        let plan = self
            .state
            .update(move |s| plan_sync(&s.canonical, captured_at, &sync_config))
            .await?;
        let Some(plan) = plan else {
            debug!("canonical history empty, skipping sync");
            return Ok(());
        };

        let outcome = run_sync(store, &plan).await;

        let name = store.name();
        let read_back = outcome.read_back.clone();
        let failures: Vec<String> = outcome
            .errors()
            .into_iter()
            .map(|(step, e)| match e {
                RemoteError::Unauthorized => format!("{name}: {} not authorized", step.to_uppercase()),
                other => format!("{name}: {step} failed ({})", other.kind()),
            })
            .collect();

        self.state
            .update(move |s| {
                if let Ok(entries) = read_back {
                    if !entries.is_empty() {
                        s.canonical.remote_entries = entries;
                    }
                }
                for failure in failures {
                    s.canonical.notify(Notice::append(failure));
                }
            })
            .await?;

        cycle.report.sync = Some(outcome);
        Ok(())
    }
}

fn plan_sync(canonical: &CanonicalState, captured_at: DateTime<Utc>, config: &SyncConfig) -> Option<SyncPlan> {
    SyncPlan::build(&canonical.history, canonical.current_glucose, captured_at, config)
}
