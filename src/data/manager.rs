//! Data manager: the engine's public operations. Every state change goes
//! through the session coordinator first.

use crate::codec::{CodecGateway, Compression};
use crate::coordinator::{SessionCoordinator, SessionState};
use crate::data::schema::RecordedData;
use crate::data::store::RecordedDataStore;
use crate::data::validation;
use crate::error::{RecordReplayError, Result};
use crate::pipeline::{EventPublisher, InboundEvent, MetadataRegistry};
use crate::recording::{RecordStatus, RecordingLimits, RecordingSessionManager};
use crate::replay::{ReplayScheduler, ReplaySettings, ReplayStatus};
use serde::Serialize;
use std::sync::Arc;

/// Coordinator state plus the active session's status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionSnapshot {
    Idle,
    Recording { status: RecordStatus },
    Replaying { status: ReplayStatus },
    Importing,
}

pub struct DataManager {
    coordinator: Arc<SessionCoordinator>,
    store: Arc<RecordedDataStore>,
    recorder: RecordingSessionManager,
    scheduler: ReplayScheduler,
    registry: Arc<dyn MetadataRegistry>,
    codec: CodecGateway,
}

impl DataManager {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        registry: Arc<dyn MetadataRegistry>,
        codec: CodecGateway,
    ) -> Self {
        let coordinator = Arc::new(SessionCoordinator::new());
        let store = Arc::new(RecordedDataStore::new(Arc::clone(&coordinator)));
        Self {
            recorder: RecordingSessionManager::new(Arc::clone(&coordinator), Arc::clone(&store)),
            scheduler: ReplayScheduler::new(Arc::clone(&coordinator), publisher),
            coordinator,
            store,
            registry,
            codec,
        }
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    pub fn start_recording(&self, limits: RecordingLimits) -> Result<()> {
        self.recorder.start(limits)
    }

    pub fn cancel_recording(&self) -> Result<()> {
        self.recorder.cancel()
    }

    pub fn recording_status(&self) -> RecordStatus {
        self.recorder.status()
    }

    /// Inbound pipeline delivery. Returns whether a recording took the batch.
    pub async fn deliver(&self, batch: Vec<InboundEvent>) -> bool {
        self.recorder.deliver(batch).await
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    pub fn start_replay(&self, settings: ReplaySettings) -> Result<()> {
        let state = self.coordinator.current_state();
        if state != SessionState::Idle {
            return Err(RecordReplayError::SessionBusy(state));
        }
        let data = self.store.get()?;
        self.scheduler.start(data, settings)
    }

    pub fn cancel_replay(&self) -> Result<()> {
        self.scheduler.cancel()
    }

    pub fn replay_status(&self) -> ReplayStatus {
        self.scheduler.status()
    }

    // -----------------------------------------------------------------------
    // Export / import
    // -----------------------------------------------------------------------

    pub fn export_recorded_data(&self) -> Result<Arc<RecordedData>> {
        self.store.get()
    }

    pub fn export_encoded(&self, compression: Compression) -> Result<Vec<u8>> {
        let data = self.store.get()?;
        self.codec.encode(&data, compression)
    }

    pub fn decode_import(&self, body: &[u8], compression: Compression) -> Result<RecordedData> {
        self.codec.decode(body, compression)
    }

    /// Register the payload's profiles and devices with the host, then make
    /// it the stored recording. With `overwrite` unset, any name collision
    /// fails the whole import before anything is written.
    ///
    /// The coordinator is held in `Importing` until the store is written, so
    /// no session can start halfway through.
    pub fn import_recorded_data(&self, data: RecordedData, overwrite: bool) -> Result<()> {
        self.coordinator.try_acquire(SessionState::Importing)?;
        let result = self.write_import(data, overwrite);
        self.coordinator.release(SessionState::Importing);
        result
    }

    fn write_import(&self, data: RecordedData, overwrite: bool) -> Result<()> {
        validation::validate_import(&data)?;

        if !overwrite {
            let mut conflicts: Vec<String> = data
                .profiles
                .iter()
                .filter(|p| self.registry.contains_profile(&p.name))
                .map(|p| format!("profile {}", p.name))
                .collect();
            conflicts.extend(
                data.devices
                    .iter()
                    .filter(|d| self.registry.contains_device(&d.name))
                    .map(|d| format!("device {}", d.name)),
            );
            if !conflicts.is_empty() {
                return Err(RecordReplayError::MetadataConflict(format!(
                    "already exists and overwrite is disabled: {}",
                    conflicts.join(", ")
                )));
            }
        }

        for profile in &data.profiles {
            self.registry.upsert_profile(profile.clone())?;
        }
        for device in &data.devices {
            self.registry.upsert_device(device.clone())?;
        }

        tracing::info!(
            "Imported recording: {} events, {} devices, {} profiles (overwrite={})",
            data.recorded_events.len(),
            data.devices.len(),
            data.profiles.len(),
            overwrite
        );
        self.store.put(data);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub fn current_state(&self) -> SessionState {
        self.coordinator.current_state()
    }

    pub fn session_snapshot(&self) -> SessionSnapshot {
        match self.coordinator.current_state() {
            SessionState::Idle => SessionSnapshot::Idle,
            SessionState::Recording => SessionSnapshot::Recording {
                status: self.recorder.status(),
            },
            SessionState::Replaying => SessionSnapshot::Replaying {
                status: self.scheduler.status(),
            },
            SessionState::Importing => SessionSnapshot::Importing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::fixtures::{device, event, profile, recorded_data};
    use crate::pipeline::{BroadcastPublisher, InMemoryRegistry};
    use std::time::Duration;

    fn manager_with_registry() -> (DataManager, Arc<InMemoryRegistry>) {
        let registry = Arc::new(InMemoryRegistry::new());
        let manager = DataManager::new(
            Arc::new(BroadcastPublisher::default()),
            registry.clone(),
            CodecGateway::default(),
        );
        (manager, registry)
    }

    fn inbound(i: i64) -> InboundEvent {
        InboundEvent {
            event: event("Thermostat-1", "Thermostat", i),
            device: device("Thermostat-1", "Thermostat"),
            profile: profile("Thermostat"),
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_record_then_export() {
        let (manager, _) = manager_with_registry();
        assert!(matches!(
            manager.export_recorded_data(),
            Err(RecordReplayError::NoDataAvailable(_))
        ));

        manager
            .start_recording(RecordingLimits::with_event_limit(3))
            .unwrap();
        assert!(manager.export_recorded_data().is_err());
        assert!(matches!(
            manager.session_snapshot(),
            SessionSnapshot::Recording { .. }
        ));

        manager.deliver((0..3).map(inbound).collect()).await;
        settle().await;

        let data = manager.export_recorded_data().unwrap();
        assert_eq!(data.recorded_events.len(), 3);
        assert_eq!(manager.session_snapshot(), SessionSnapshot::Idle);
    }

    #[tokio::test]
    async fn test_start_pairs_are_busy() {
        let (manager, _) = manager_with_registry();
        manager.import_recorded_data(recorded_data(3, 1_000_000_000), true).unwrap();
        let replay = ReplaySettings {
            rate: 1.0,
            repeat_count: 0,
        };
        let record = RecordingLimits::with_event_limit(10);

        manager.start_recording(record).unwrap();
        assert!(matches!(manager.start_recording(record), Err(RecordReplayError::SessionBusy(_))));
        assert!(matches!(manager.start_replay(replay), Err(RecordReplayError::SessionBusy(_))));
        manager.cancel_recording().unwrap();

        manager.start_replay(replay).unwrap();
        assert!(matches!(manager.start_recording(record), Err(RecordReplayError::SessionBusy(_))));
        assert!(matches!(manager.start_replay(replay), Err(RecordReplayError::SessionBusy(_))));
        manager.cancel_replay().unwrap();
        assert_eq!(manager.current_state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_replay_without_data() {
        let (manager, _) = manager_with_registry();
        let result = manager.start_replay(ReplaySettings {
            rate: 1.0,
            repeat_count: 0,
        });
        assert!(matches!(result, Err(RecordReplayError::NoDataAvailable(_))));
        assert_eq!(manager.current_state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_duration_recording_blocks_replay() {
        let (manager, _) = manager_with_registry();
        manager
            .start_recording(RecordingLimits::with_duration(Duration::from_secs(1)))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(manager.export_recorded_data().unwrap().recorded_events.is_empty());
        assert!(matches!(
            manager.start_replay(ReplaySettings {
                rate: 1.0,
                repeat_count: 0
            }),
            Err(RecordReplayError::NoDataAvailable(_))
        ));
        assert_eq!(manager.current_state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_import_registers_metadata() {
        let (manager, registry) = manager_with_registry();
        manager.import_recorded_data(recorded_data(2, 10), true).unwrap();
        assert!(registry.contains_device("Thermostat-1"));
        assert!(registry.contains_profile("Thermostat"));
        assert_eq!(manager.export_recorded_data().unwrap().recorded_events.len(), 2);
    }

    #[tokio::test]
    async fn test_import_without_overwrite_conflict_is_atomic() {
        let (manager, registry) = manager_with_registry();
        let mut existing = device("Thermostat-1", "Thermostat");
        existing.description = Some("installed".to_string());
        registry.upsert_device(existing).unwrap();

        let result = manager.import_recorded_data(recorded_data(2, 10), false);
        assert!(matches!(result, Err(RecordReplayError::MetadataConflict(_))));
        assert!(!registry.contains_profile("Thermostat"));
        assert_eq!(
            registry.device("Thermostat-1").unwrap().description.as_deref(),
            Some("installed")
        );
        assert!(manager.export_recorded_data().is_err());

        manager.import_recorded_data(recorded_data(2, 10), true).unwrap();
        assert!(registry.device("Thermostat-1").unwrap().description.is_none());
    }

    #[tokio::test]
    async fn test_invalid_import_leaves_store_untouched() {
        let (manager, _) = manager_with_registry();
        manager.import_recorded_data(recorded_data(4, 10), true).unwrap();

        for strip in 0..3 {
            let mut data = recorded_data(1, 10);
            match strip {
                0 => data.recorded_events.clear(),
                1 => data.devices.clear(),
                _ => data.profiles.clear(),
            }
            assert!(matches!(
                manager.import_recorded_data(data, true),
                Err(RecordReplayError::Validation(_))
            ));
        }
        assert_eq!(manager.export_recorded_data().unwrap().recorded_events.len(), 4);
    }

    #[tokio::test]
    async fn test_import_rejected_while_busy() {
        let (manager, _) = manager_with_registry();
        manager
            .start_recording(RecordingLimits::with_event_limit(5))
            .unwrap();
        assert!(matches!(
            manager.import_recorded_data(recorded_data(1, 10), true),
            Err(RecordReplayError::SessionBusy(SessionState::Recording))
        ));
    }

    /// Registry that tries to start a recording while an import is writing.
    #[derive(Default)]
    struct InterleavingRegistry {
        inner: InMemoryRegistry,
        manager: std::sync::OnceLock<std::sync::Weak<DataManager>>,
        attempt: parking_lot::Mutex<Option<Result<()>>>,
    }

    impl MetadataRegistry for InterleavingRegistry {
        fn contains_device(&self, name: &str) -> bool {
            self.inner.contains_device(name)
        }

        fn contains_profile(&self, name: &str) -> bool {
            self.inner.contains_profile(name)
        }

        fn upsert_device(&self, device: crate::data::Device) -> Result<()> {
            self.inner.upsert_device(device)
        }

        fn upsert_profile(&self, profile: crate::data::DeviceProfile) -> Result<()> {
            if let Some(manager) = self.manager.get().and_then(|m| m.upgrade()) {
                *self.attempt.lock() =
                    Some(manager.start_recording(RecordingLimits::with_event_limit(1)));
            }
            self.inner.upsert_profile(profile)
        }
    }

    #[tokio::test]
    async fn test_session_cannot_start_during_import() {
        let registry = Arc::new(InterleavingRegistry::default());
        let manager = Arc::new(DataManager::new(
            Arc::new(BroadcastPublisher::default()),
            registry.clone(),
            CodecGateway::default(),
        ));
        registry.manager.set(Arc::downgrade(&manager)).unwrap();

        manager.import_recorded_data(recorded_data(3, 10), true).unwrap();

        assert!(matches!(
            registry.attempt.lock().take(),
            Some(Err(RecordReplayError::SessionBusy(SessionState::Importing)))
        ));
        assert_eq!(manager.current_state(), SessionState::Idle);
        assert_eq!(manager.export_recorded_data().unwrap().recorded_events.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_import_releases_coordinator() {
        let (manager, _) = manager_with_registry();
        assert!(manager
            .import_recorded_data(RecordedData::default(), true)
            .is_err());
        assert_eq!(manager.current_state(), SessionState::Idle);
        manager
            .start_recording(RecordingLimits::with_event_limit(1))
            .unwrap();
    }

    #[tokio::test]
    async fn test_export_import_round_trip_through_codec() {
        let (manager, _) = manager_with_registry();
        let original = recorded_data(5, 250_000_000);
        manager.import_recorded_data(original.clone(), true).unwrap();

        for compression in [Compression::None, Compression::Zlib, Compression::Gzip] {
            let bytes = manager.export_encoded(compression).unwrap();
            let decoded = manager.decode_import(&bytes, compression).unwrap();
            assert_eq!(decoded, original);
        }
    }
}
