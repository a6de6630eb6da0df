//! Single-slot store for the most recently completed recording.

use crate::coordinator::{SessionCoordinator, SessionState};
use crate::data::schema::RecordedData;
use crate::error::{RecordReplayError, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// Holds at most one completed, immutable `RecordedData`.
pub struct RecordedDataStore {
    current: RwLock<Option<Arc<RecordedData>>>,
    coordinator: Arc<SessionCoordinator>,
}

impl RecordedDataStore {
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        Self {
            current: RwLock::new(None),
            coordinator,
        }
    }

    /// Snapshot of the stored recording. Unavailable while a recording is in
    /// progress, since the working buffer is not a valid snapshot yet.
    pub fn get(&self) -> Result<Arc<RecordedData>> {
        if self.coordinator.current_state() == SessionState::Recording {
            return Err(RecordReplayError::NoDataAvailable(
                "recording in progress".to_string(),
            ));
        }
        self.current.read().clone().ok_or_else(|| {
            RecordReplayError::NoDataAvailable("no recording has completed".to_string())
        })
    }

    /// Replace the stored recording.
    pub fn put(&self, data: RecordedData) {
        tracing::debug!(
            "Storing recording: {} events, {} devices, {} profiles",
            data.recorded_events.len(),
            data.devices.len(),
            data.profiles.len()
        );
        *self.current.write() = Some(Arc::new(data));
    }
}
