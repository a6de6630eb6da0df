//! Event capture: drains pipeline batches into a working recording and
//! enforces the stop conditions (deadline, event limit, cancel).

use crate::coordinator::{SessionCoordinator, SessionState};
use crate::data::{Device, DeviceProfile, Event, RecordedData, RecordedDataStore};
use crate::error::{RecordReplayError, Result};
use crate::pipeline::InboundEvent;
use crate::recording::schema::{RecordStatus, RecordingLimits};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

/// Pipeline delivery blocks once this many batches are waiting.
const HANDOFF_CAPACITY: usize = 1;

/// Transient state of an in-progress capture.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: Uuid,
    pub started_at: Instant,
    pub limits: RecordingLimits,
    pub event_count: u64,
}

impl RecordingSession {
    fn new(limits: RecordingLimits) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
            limits,
            event_count: 0,
        }
    }

    fn status(&self) -> RecordStatus {
        RecordStatus {
            in_progress: true,
            event_count: self.event_count,
            duration: self.started_at.elapsed().as_secs_f64(),
            configured_duration: self.limits.duration.map(|d| d.as_secs_f64()),
            event_limit: self.limits.event_limit,
        }
    }
}

struct ActiveRecording {
    session: Arc<Mutex<RecordingSession>>,
    batch_tx: mpsc::Sender<Vec<InboundEvent>>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

/// Working buffer: events in arrival order, metadata deduplicated by name
/// with the first definition seen winning.
#[derive(Default)]
struct CaptureBuffer {
    events: Vec<Event>,
    devices: Vec<Device>,
    profiles: Vec<DeviceProfile>,
    device_names: HashSet<String>,
    profile_names: HashSet<String>,
}

impl CaptureBuffer {
    /// Append one batch, stopping at `limit`. Returns true once the limit is hit.
    fn append(&mut self, batch: Vec<InboundEvent>, limit: Option<u64>) -> bool {
        for inbound in batch {
            if limit.is_some_and(|l| self.events.len() as u64 >= l) {
                return true;
            }
            if self.device_names.insert(inbound.device.name.clone()) {
                self.devices.push(inbound.device);
            }
            if self.profile_names.insert(inbound.profile.name.clone()) {
                self.profiles.push(inbound.profile);
            }
            self.events.push(inbound.event);
        }
        limit.is_some_and(|l| self.events.len() as u64 >= l)
    }

    fn len(&self) -> u64 {
        self.events.len() as u64
    }

    fn into_recorded_data(self) -> RecordedData {
        RecordedData {
            recorded_events: self.events,
            devices: self.devices,
            profiles: self.profiles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Deadline,
    EventLimit,
    Canceled,
}

/// The event capture consumer. One recording at a time, guarded by the
/// session coordinator.
pub struct RecordingSessionManager {
    coordinator: Arc<SessionCoordinator>,
    store: Arc<RecordedDataStore>,
    active: Arc<Mutex<Option<ActiveRecording>>>,
}

impl RecordingSessionManager {
    pub fn new(coordinator: Arc<SessionCoordinator>, store: Arc<RecordedDataStore>) -> Self {
        Self {
            coordinator,
            store,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Start capturing. `limits` must already be validated.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, limits: RecordingLimits) -> Result<()> {
        let session = RecordingSession::new(limits);
        let deadline = match limits.duration {
            Some(d) => Some(session.started_at.checked_add(d).ok_or_else(|| {
                RecordReplayError::Validation(format!(
                    "Duration of {}s is out of range",
                    d.as_secs_f64()
                ))
            })?),
            None => None,
        };
        self.coordinator.try_acquire(SessionState::Recording)?;

        let id = session.id;
        let session = Arc::new(Mutex::new(session));
        let (batch_tx, batch_rx) = mpsc::channel(HANDOFF_CAPACITY);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        *self.active.lock() = Some(ActiveRecording {
            session: Arc::clone(&session),
            batch_tx,
            cancel_tx: Some(cancel_tx),
        });

        tracing::info!(
            "Recording {} started (duration={:?}, event_limit={:?})",
            id,
            limits.duration,
            limits.event_limit
        );

        let worker = CaptureWorker {
            id,
            limit: limits.event_limit,
            session,
            active: Arc::clone(&self.active),
            coordinator: Arc::clone(&self.coordinator),
            store: Arc::clone(&self.store),
        };
        tokio::spawn(worker.run(batch_rx, cancel_rx, deadline));

        Ok(())
    }

    /// Hand one batch to the capture worker. Waits while the previous batch
    /// is still queued.
    ///
    /// Returns true once the batch is queued, not captured: a recording that
    /// reaches its limit or deadline first discards batches still in the
    /// queue. Returns false when no recording is active to queue it.
    pub async fn deliver(&self, batch: Vec<InboundEvent>) -> bool {
        let tx = match self.active.lock().as_ref() {
            Some(active) => active.batch_tx.clone(),
            None => return false,
        };
        let size = batch.len();
        match tx.send(batch).await {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!("Recording ended before batch of {} events was queued", size);
                false
            }
        }
    }

    /// Stop immediately and discard everything captured so far.
    pub fn cancel(&self) -> Result<()> {
        let mut slot = self.active.lock();
        let mut active = slot.take().ok_or(RecordReplayError::NotRecording)?;
        if let Some(cancel_tx) = active.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
        self.coordinator.release(SessionState::Recording);
        drop(slot);

        let session = active.session.lock();
        tracing::warn!(
            "Recording {} canceled after {} events; captured data discarded",
            session.id,
            session.event_count
        );
        Ok(())
    }

    pub fn status(&self) -> RecordStatus {
        match self.active.lock().as_ref() {
            Some(active) => active.session.lock().status(),
            None => RecordStatus::default(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().is_some()
    }
}

struct CaptureWorker {
    id: Uuid,
    limit: Option<u64>,
    session: Arc<Mutex<RecordingSession>>,
    active: Arc<Mutex<Option<ActiveRecording>>>,
    coordinator: Arc<SessionCoordinator>,
    store: Arc<RecordedDataStore>,
}

impl CaptureWorker {
    async fn run(
        self,
        mut batch_rx: mpsc::Receiver<Vec<InboundEvent>>,
        mut cancel_rx: oneshot::Receiver<()>,
        deadline: Option<Instant>,
    ) {
        let mut buffer = CaptureBuffer::default();

        let reason = loop {
            tokio::select! {
                biased;
                _ = &mut cancel_rx => break StopReason::Canceled,
                _ = wait_for_deadline(deadline) => break StopReason::Deadline,
                batch = batch_rx.recv() => {
                    let Some(batch) = batch else {
                        break StopReason::Canceled;
                    };
                    let size = batch.len();
                    let limit_reached = buffer.append(batch, self.limit);
                    self.session.lock().event_count = buffer.len();
                    tracing::debug!(
                        "Recording {}: batch of {} events, {} captured",
                        self.id,
                        size,
                        buffer.len()
                    );
                    if limit_reached {
                        break StopReason::EventLimit;
                    }
                }
            }
        };

        // Closing the receiver fails any delivery still waiting on the queue.
        batch_rx.close();
        self.finish(reason, buffer);
    }

    /// Publish the buffer and release the coordinator, unless a cancel
    /// already took ownership of the session.
    fn finish(self, reason: StopReason, buffer: CaptureBuffer) {
        let mut slot = self.active.lock();
        let owned = slot
            .as_ref()
            .is_some_and(|active| active.session.lock().id == self.id);
        if !owned {
            return;
        }
        slot.take();

        if reason == StopReason::Canceled {
            self.coordinator.release(SessionState::Recording);
            tracing::warn!("Recording {} lost its delivery queue; data discarded", self.id);
            return;
        }

        let count = buffer.len();
        self.store.put(buffer.into_recorded_data());
        self.coordinator.release(SessionState::Recording);
        tracing::info!(
            "Recording {} complete ({:?}): {} events captured",
            self.id,
            reason,
            count
        );
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
