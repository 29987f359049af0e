//! Canonical state and its single owner
//!
//! ## Ownership Model
//!
//! All mutation of the canonical state happens on one task, the state
//! owner. Everything else sends it closures over a channel and awaits the
//! reply:
//!
//! ```text
//! cycle task ──update(|s| ...)──► [ command queue ] ──► owner task ──► &mut OwnedState
//!      ▲                                                    │
//!      └──────────────── oneshot reply ◄────────────────────┘
//!                                                           │
//! readers ◄──── watch::Receiver<Arc<CanonicalState>> ◄──────┘ (after every command)
//! ```
//!
//! Commands run one at a time in arrival order, so no locks guard the state.
//! Readers (export, presentation) only ever see immutable snapshots.

use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::alarm::{AlarmClass, TrendClass};
use crate::calibration::{CalibrationParameters, CurrentGlucose};
use crate::errors::PipelineError;
use crate::identity::IdentifierCache;
use crate::notices::{Notice, NoticeBoard};
use crate::reading::Reading;

/// Process-wide reconciled view, read freely by downstream consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalState {
    /// Raw trend of the latest cycle
    pub raw_trend: Vec<Reading>,
    /// Raw history of the latest cycle
    pub raw_history: Vec<Reading>,
    /// Trend after applying the latest usable calibration
    pub calibrated_trend: Vec<Reading>,
    /// History after applying the latest usable calibration
    pub calibrated_history: Vec<Reading>,
    /// Canonical remote-corrected history; empty when unusable this cycle
    pub history: Vec<Reading>,
    /// Current glucose
    pub current_glucose: CurrentGlucose,
    /// Most recent calibration received, possibly from an earlier cycle
    pub calibration: Option<CalibrationParameters>,
    /// Last alarm classification from the calibration service
    pub alarm: AlarmClass,
    /// Last trend classification from the calibration service
    pub trend: TrendClass,
    /// Local mirror of the remote time-series store
    pub remote_entries: Vec<Reading>,
    /// User-visible notices
    pub notices: NoticeBoard,
    /// Completed cycles
    pub cycles: u64,
}

impl CanonicalState {
    /// Post a user-visible notice
    pub fn notify(&mut self, notice: Notice) {
        self.notices.post(notice);
    }
}

/// State confined to the owner task
#[derive(Debug, Clone, Default)]
pub struct OwnedState {
    /// The canonical view
    pub canonical: CanonicalState,
    /// Identifiers cached across cycles
    pub identifiers: IdentifierCache,
}

type StateTask = Box<dyn FnOnce(&mut OwnedState) + Send + 'static>;

enum StateCommand {
    Execute(StateTask),
    Shutdown,
}

/// Cloneable handle for sending work to the state owner
#[derive(Clone)]
pub struct StateHandle {
    sender: mpsc::UnboundedSender<StateCommand>,
    snapshots: watch::Receiver<Arc<CanonicalState>>,
}

impl StateHandle {
    /// Run `task` on the owner and return its result
    pub async fn update<R, F>(&self, task: F) -> Result<R, PipelineError>
    where
        R: Send + 'static,
        F: FnOnce(&mut OwnedState) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = StateCommand::Execute(Box::new(move |state| {
            let _ = reply_tx.send(task(state));
        }));
        self.sender
            .send(command)
            .map_err(|_| PipelineError::StateOwnerGone)?;
        reply_rx.await.map_err(|_| PipelineError::StateOwnerGone)
    }

    /// Latest published canonical state
    pub fn snapshot(&self) -> Arc<CanonicalState> {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every state change
    pub fn subscribe(&self) -> watch::Receiver<Arc<CanonicalState>> {
        self.snapshots.clone()
    }

    /// Drop all accumulated notices
    pub async fn clear_notices(&self) -> Result<(), PipelineError> {
        self.update(|state| state.canonical.notices.clear()).await
    }
}

/// The task owning the canonical state
pub struct StateOwner {
    handle: StateHandle,
    worker: JoinHandle<OwnedState>,
}

impl StateOwner {
    /// Spawn the owner task on the current tokio runtime
    pub fn spawn(initial: OwnedState) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(initial.canonical.clone()));

        let worker = tokio::spawn(run_owner(initial, command_rx, snapshot_tx));

        Self {
            handle: StateHandle { sender: command_tx, snapshots: snapshot_rx },
            worker,
        }
    }

    /// Handle for sending work to the owner
    pub fn handle(&self) -> StateHandle {
        self.handle.clone()
    }

    /// Stop the owner after queued commands have run, returning the final state
    pub async fn shutdown(self) -> Result<OwnedState, PipelineError> {
        self.handle
            .sender
            .send(StateCommand::Shutdown)
            .map_err(|_| PipelineError::StateOwnerGone)?;
        self.worker.await.map_err(|_| PipelineError::StateOwnerGone)
    }
}

async fn run_owner(
    mut state: OwnedState,
    mut commands: mpsc::UnboundedReceiver<StateCommand>,
    snapshots: watch::Sender<Arc<CanonicalState>>,
) -> OwnedState {
    while let Some(command) = commands.recv().await {
        match command {
            StateCommand::Execute(task) => {
                task(&mut state);
                snapshots.send_replace(Arc::new(state.canonical.clone()));
            }
            StateCommand::Shutdown => break,
        }
    }
    debug!("{} notices pending at shutdown", state.canonical.notices.notices().len());
    info!("state owner shutting down");
    state
}
