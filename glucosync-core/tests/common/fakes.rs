//! Recording fakes for the remote collaborators

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use glucosync_core::{
    AlarmEvent, AlarmSink, CalibrationParameters, CalibrationRequest, CalibrationService,
    CorrectedHistory, EntryStore, HistoryRequest, Reading, RemoteError, RemoteResult,
};

/// Calibration service returning canned responses
pub struct FakeCalibrationService {
    calibration: Mutex<RemoteResult<CalibrationParameters>>,
    history: Mutex<RemoteResult<CorrectedHistory>>,
    pub calibration_requests: Mutex<Vec<CalibrationRequest>>,
    pub history_requests: Mutex<Vec<HistoryRequest>>,
}

impl FakeCalibrationService {
    /// Service where both calls fail with a transport error
    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            calibration: Mutex::new(Err(RemoteError::Transport("unreachable".into()))),
            history: Mutex::new(Err(RemoteError::Transport("unreachable".into()))),
            calibration_requests: Mutex::new(Vec::new()),
            history_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_calibration(&self, result: RemoteResult<CalibrationParameters>) {
        *self.calibration.lock().unwrap() = result;
    }

    pub fn set_history(&self, result: RemoteResult<CorrectedHistory>) {
        *self.history.lock().unwrap() = result;
    }

    pub fn history_calls(&self) -> usize {
        self.history_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CalibrationService for FakeCalibrationService {
    async fn calibration(&self, request: &CalibrationRequest) -> RemoteResult<CalibrationParameters> {
        self.calibration_requests.lock().unwrap().push(request.clone());
        // Let the history call overtake this one
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.calibration.lock().unwrap().clone()
    }

    async fn history(&self, request: &HistoryRequest) -> RemoteResult<CorrectedHistory> {
        self.history_requests.lock().unwrap().push(request.clone());
        self.history.lock().unwrap().clone()
    }

    fn name(&self) -> &'static str {
        "fake calibration"
    }
}

/// Entry store recording the start and end of every call
#[derive(Default)]
pub struct RecordingStore {
    pub events: Mutex<Vec<String>>,
    pub posted: Mutex<Vec<Vec<Reading>>>,
    pub delete_filters: Mutex<Vec<(String, usize)>>,
    pub delete_result: Mutex<Option<RemoteError>>,
    pub remote: Mutex<Vec<Reading>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_delete(&self, error: RemoteError) {
        *self.delete_result.lock().unwrap() = Some(error);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }
}

#[async_trait]
impl EntryStore for RecordingStore {
    async fn delete_entries(&self, device_tag: &str, count: usize) -> RemoteResult<()> {
        self.record("delete:start");
        self.delete_filters.lock().unwrap().push((device_tag.to_string(), count));
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.record("delete:end");
        match self.delete_result.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn post_entries(&self, entries: &[Reading]) -> RemoteResult<()> {
        self.record("post:start");
        self.posted.lock().unwrap().push(entries.to_vec());
        tokio::time::sleep(Duration::from_millis(5)).await;
        *self.remote.lock().unwrap() = entries.to_vec();
        self.record("post:end");
        Ok(())
    }

    async fn read_entries(&self, count: usize) -> RemoteResult<Vec<Reading>> {
        self.record("read:start");
        tokio::time::sleep(Duration::from_millis(5)).await;
        let remote: Vec<Reading> = self.remote.lock().unwrap().iter().take(count).cloned().collect();
        self.record("read:end");
        Ok(remote)
    }

    fn name(&self) -> &'static str {
        "recording store"
    }
}

/// Alarm sink counting triggers
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<AlarmEvent>>,
}

impl AlarmSink for RecordingSink {
    fn trigger(&self, event: &AlarmEvent) {
        self.events.lock().unwrap().push(*event);
    }
}
