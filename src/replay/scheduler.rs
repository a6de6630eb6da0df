//! Paced re-emission of a stored recording into the host pipeline.

use crate::coordinator::{SessionCoordinator, SessionState};
use crate::data::{Event, RecordedData};
use crate::error::{RecordReplayError, Result};
use crate::pipeline::EventPublisher;
use crate::replay::schema::{ReplaySettings, ReplayStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

/// Transient state of an in-progress replay.
#[derive(Debug, Clone)]
pub struct ReplaySession {
    pub id: Uuid,
    pub started_at: Instant,
    pub settings: ReplaySettings,
    /// 0-based index of the pass being emitted.
    pub pass_index: u64,
    /// Events emitted so far in the current pass.
    pub event_index: u64,
    pub events_per_pass: u64,
}

impl ReplaySession {
    fn status(&self) -> ReplayStatus {
        ReplayStatus {
            running: true,
            current_pass: self.pass_index + 1,
            total_passes: self.settings.total_passes(),
            event_count: self.event_index,
            events_per_pass: self.events_per_pass,
            replay_rate: self.settings.rate,
            duration: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

struct ActiveReplay {
    session: Arc<Mutex<ReplaySession>>,
    cancel_tx: watch::Sender<bool>,
}

enum ReplayOutcome {
    Completed { emitted: u64 },
    Canceled,
    Failed(RecordReplayError),
}

/// Replays one recording at a time, guarded by the session coordinator.
pub struct ReplayScheduler {
    coordinator: Arc<SessionCoordinator>,
    publisher: Arc<dyn EventPublisher>,
    active: Arc<Mutex<Option<ActiveReplay>>>,
}

impl ReplayScheduler {
    pub fn new(coordinator: Arc<SessionCoordinator>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            coordinator,
            publisher,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Begin replaying `data`. `settings` must already be validated.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, data: Arc<RecordedData>, settings: ReplaySettings) -> Result<()> {
        self.coordinator.try_acquire(SessionState::Replaying)?;

        if data.is_empty() {
            self.coordinator.release(SessionState::Replaying);
            return Err(RecordReplayError::NoDataAvailable(
                "recording contains no events".to_string(),
            ));
        }

        let session = ReplaySession {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
            settings,
            pass_index: 0,
            event_index: 0,
            events_per_pass: data.recorded_events.len() as u64,
        };
        let id = session.id;
        let session = Arc::new(Mutex::new(session));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        *self.active.lock() = Some(ActiveReplay {
            session: Arc::clone(&session),
            cancel_tx,
        });

        tracing::info!(
            "Replay {} started: {} events x {} passes at rate {}",
            id,
            data.recorded_events.len(),
            settings.total_passes(),
            settings.rate
        );

        let worker = ReplayWorker {
            id,
            settings,
            session,
            publisher: Arc::clone(&self.publisher),
            active: Arc::clone(&self.active),
            coordinator: Arc::clone(&self.coordinator),
        };
        tokio::spawn(worker.run(data, cancel_rx));

        Ok(())
    }

    /// Stop before the next emission, preempting any pending wait.
    pub fn cancel(&self) -> Result<()> {
        let mut slot = self.active.lock();
        let active = slot.take().ok_or(RecordReplayError::NotReplaying)?;
        let _ = active.cancel_tx.send(true);
        self.coordinator.release(SessionState::Replaying);
        drop(slot);

        let session = active.session.lock();
        tracing::warn!(
            "Replay {} canceled in pass {} after {} events",
            session.id,
            session.pass_index + 1,
            session.event_index
        );
        Ok(())
    }

    pub fn status(&self) -> ReplayStatus {
        match self.active.lock().as_ref() {
            Some(active) => active.session.lock().status(),
            None => ReplayStatus::default(),
        }
    }

    pub fn is_replaying(&self) -> bool {
        self.active.lock().is_some()
    }
}

struct ReplayWorker {
    id: Uuid,
    settings: ReplaySettings,
    session: Arc<Mutex<ReplaySession>>,
    publisher: Arc<dyn EventPublisher>,
    active: Arc<Mutex<Option<ActiveReplay>>>,
    coordinator: Arc<SessionCoordinator>,
}

impl ReplayWorker {
    async fn run(self, data: Arc<RecordedData>, cancel_rx: watch::Receiver<bool>) {
        let outcome = self.emit_all(&data.recorded_events, cancel_rx).await;
        self.finish(outcome);
    }

    async fn emit_all(
        &self,
        events: &[Event],
        mut cancel_rx: watch::Receiver<bool>,
    ) -> ReplayOutcome {
        let mut emitted = 0u64;

        for pass in 0..self.settings.total_passes() {
            {
                let mut session = self.session.lock();
                session.pass_index = pass;
                session.event_index = 0;
            }

            let mut previous_origin: Option<i64> = None;
            for event in events {
                if let Some(previous) = previous_origin {
                    let delay = pacing_delay(previous, event.origin, self.settings.rate);
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel_rx.changed() => return ReplayOutcome::Canceled,
                        }
                    }
                }
                if *cancel_rx.borrow() {
                    return ReplayOutcome::Canceled;
                }

                if let Err(e) = self.publisher.publish(&as_fresh_capture(event)) {
                    return ReplayOutcome::Failed(e);
                }
                emitted += 1;
                self.session.lock().event_index += 1;
                previous_origin = Some(event.origin);
            }

            tracing::debug!("Replay {}: pass {} complete", self.id, pass + 1);
        }

        ReplayOutcome::Completed { emitted }
    }

    fn finish(self, outcome: ReplayOutcome) {
        let mut slot = self.active.lock();
        let owned = slot
            .as_ref()
            .is_some_and(|active| active.session.lock().id == self.id);
        if !owned {
            return;
        }
        slot.take();
        self.coordinator.release(SessionState::Replaying);
        drop(slot);

        match outcome {
            ReplayOutcome::Completed { emitted } => {
                tracing::info!("Replay {} complete: {} events emitted", self.id, emitted)
            }
            ReplayOutcome::Canceled => tracing::warn!("Replay {} stopped", self.id),
            ReplayOutcome::Failed(e) => tracing::error!("Replay {} aborted: {}", self.id, e),
        }
    }
}

/// Wait before emitting an event: the original gap scaled by `1 / rate`.
/// Out-of-order origins never produce a negative wait.
pub fn pacing_delay(previous_origin: i64, origin: i64, rate: f64) -> Duration {
    let gap_ns = origin.saturating_sub(previous_origin) as f64 / rate;
    if gap_ns.is_nan() || gap_ns <= 0.0 {
        return Duration::ZERO;
    }
    if gap_ns.is_infinite() {
        return Duration::MAX;
    }
    Duration::from_nanos(gap_ns.min(u64::MAX as f64) as u64)
}

/// Copy of `event` re-stamped as if captured now, keeping device, source,
/// profile and readings intact.
fn as_fresh_capture(event: &Event) -> Event {
    let now = now_nanos();
    let mut fresh = event.clone();
    fresh.id = Uuid::new_v4().to_string();
    fresh.origin = now;
    for reading in &mut fresh.readings {
        reading.id = Uuid::new_v4().to_string();
        reading.origin = now;
    }
    fresh
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::fixtures::{event, recorded_data};

    const MS: i64 = 1_000_000;

    /// Captures every published event with the (tokio) time it was emitted.
    #[derive(Default)]
    struct CollectingPublisher {
        emitted: Mutex<Vec<(Instant, Event)>>,
        fail_after: Option<usize>,
    }

    impl EventPublisher for CollectingPublisher {
        fn publish(&self, event: &Event) -> Result<()> {
            let mut emitted = self.emitted.lock();
            if self.fail_after.is_some_and(|n| emitted.len() >= n) {
                return Err(RecordReplayError::Publish("bus unavailable".to_string()));
            }
            emitted.push((Instant::now(), event.clone()));
            Ok(())
        }
    }

    impl CollectingPublisher {
        fn gaps_ms(&self) -> Vec<u128> {
            let emitted = self.emitted.lock();
            emitted
                .windows(2)
                .map(|w| (w[1].0 - w[0].0).as_millis())
                .collect()
        }

        fn count(&self) -> usize {
            self.emitted.lock().len()
        }
    }

    /// Three events at 0ms, 100ms and 300ms.
    fn spaced_recording() -> Arc<RecordedData> {
        let mut data = recorded_data(3, 0);
        for (event, offset) in data.recorded_events.iter_mut().zip([0, 100, 300]) {
            event.origin = 1_000 + offset * MS;
        }
        Arc::new(data)
    }

    fn new_scheduler(
        publisher: Arc<CollectingPublisher>,
    ) -> (ReplayScheduler, Arc<SessionCoordinator>) {
        let coordinator = Arc::new(SessionCoordinator::new());
        let scheduler = ReplayScheduler::new(Arc::clone(&coordinator), publisher);
        (scheduler, coordinator)
    }

    fn settings(rate: f64, repeat_count: u32) -> ReplaySettings {
        ReplaySettings { rate, repeat_count }
    }

    #[test]
    fn test_pacing_delay() {
        assert_eq!(pacing_delay(0, 100 * MS, 1.0), Duration::from_millis(100));
        assert_eq!(pacing_delay(0, 100 * MS, 2.0), Duration::from_millis(50));
        assert_eq!(pacing_delay(0, 100 * MS, 0.5), Duration::from_millis(200));
        assert_eq!(pacing_delay(100 * MS, 0, 1.0), Duration::ZERO);
        assert_eq!(pacing_delay(5, 5, 1.0), Duration::ZERO);
        // A vanishing rate stretches the gap as far as it goes.
        assert_eq!(pacing_delay(0, i64::MAX, f64::MIN_POSITIVE), Duration::MAX);
        assert_eq!(pacing_delay(i64::MAX, 0, f64::MIN_POSITIVE), Duration::ZERO);
    }

    #[test]
    fn test_fresh_capture_keeps_identity() {
        let original = event("Thermostat-1", "Thermostat", 42);
        let fresh = as_fresh_capture(&original);
        assert_ne!(fresh.id, original.id);
        assert!(fresh.origin > original.origin);
        assert_eq!(fresh.readings[0].origin, fresh.origin);
        assert_eq!(fresh.device_name, original.device_name);
        assert_eq!(fresh.source_name, original.source_name);
        assert_eq!(fresh.profile_name, original.profile_name);
        assert_eq!(fresh.readings[0].value, original.readings[0].value);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_pass_reproduces_gaps() {
        let publisher = Arc::new(CollectingPublisher::default());
        let (scheduler, coordinator) = new_scheduler(Arc::clone(&publisher));
        let data = spaced_recording();

        scheduler.start(Arc::clone(&data), settings(1.0, 0)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(publisher.gaps_ms(), vec![100, 200]);
        assert!(coordinator.is_idle());
        let emitted = publisher.emitted.lock();
        let sources: Vec<&str> = emitted.iter().map(|(_, e)| e.device_name.as_str()).collect();
        assert_eq!(sources, vec!["Thermostat-1"; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_scales_gaps() {
        let publisher = Arc::new(CollectingPublisher::default());
        let (scheduler, _) = new_scheduler(Arc::clone(&publisher));
        scheduler.start(spaced_recording(), settings(2.0, 0)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(publisher.gaps_ms(), vec![50, 100]);

        let publisher = Arc::new(CollectingPublisher::default());
        let (scheduler, _) = new_scheduler(Arc::clone(&publisher));
        scheduler.start(spaced_recording(), settings(0.5, 0)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(publisher.gaps_ms(), vec![200, 400]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_count_plays_sequence_again() {
        let publisher = Arc::new(CollectingPublisher::default());
        let (scheduler, coordinator) = new_scheduler(Arc::clone(&publisher));
        let data = spaced_recording();
        scheduler.start(Arc::clone(&data), settings(1.0, 2)).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(publisher.count(), 9);
        assert_eq!(publisher.gaps_ms(), vec![100, 200, 0, 100, 200, 0, 100, 200]);
        let emitted = publisher.emitted.lock();
        for (i, (_, e)) in emitted.iter().enumerate() {
            let original = &data.recorded_events[i % 3];
            assert_eq!(e.readings[0].value, original.readings[0].value);
        }
        assert!(coordinator.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_during_replay() {
        let publisher = Arc::new(CollectingPublisher::default());
        let (scheduler, _) = new_scheduler(Arc::clone(&publisher));
        scheduler.start(spaced_recording(), settings(1.0, 1)).unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let status = scheduler.status();
        assert!(status.running);
        assert_eq!(status.current_pass, 1);
        assert_eq!(status.total_passes, 2);
        assert_eq!(status.event_count, 2);
        assert_eq!(status.events_per_pass, 3);
        assert_eq!(status.replay_rate, 1.0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let status = scheduler.status();
        assert_eq!(status.current_pass, 2);
        assert_eq!(status.event_count, 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!scheduler.status().running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_preempts_pending_wait() {
        let publisher = Arc::new(CollectingPublisher::default());
        let (scheduler, coordinator) = new_scheduler(Arc::clone(&publisher));
        let data = Arc::new(recorded_data(3, 60_000 * MS));
        scheduler.start(data, settings(1.0, 0)).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(publisher.count(), 1);

        scheduler.cancel().unwrap();
        assert!(coordinator.is_idle());
        assert!(!scheduler.is_replaying());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(publisher.count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_without_replay() {
        let publisher = Arc::new(CollectingPublisher::default());
        let (scheduler, _) = new_scheduler(publisher);
        assert!(matches!(scheduler.cancel(), Err(RecordReplayError::NotReplaying)));
    }

    #[tokio::test]
    async fn test_empty_recording_rejected_and_released() {
        let publisher = Arc::new(CollectingPublisher::default());
        let (scheduler, coordinator) = new_scheduler(publisher);
        let result = scheduler.start(Arc::new(RecordedData::default()), settings(1.0, 0));
        assert!(matches!(result, Err(RecordReplayError::NoDataAvailable(_))));
        assert!(coordinator.is_idle());
    }

    #[tokio::test]
    async fn test_busy_when_recording() {
        let publisher = Arc::new(CollectingPublisher::default());
        let (scheduler, coordinator) = new_scheduler(publisher);
        coordinator.try_acquire(SessionState::Recording).unwrap();
        assert!(matches!(
            scheduler.start(spaced_recording(), settings(1.0, 0)),
            Err(RecordReplayError::SessionBusy(SessionState::Recording))
        ));
        assert_eq!(coordinator.current_state(), SessionState::Recording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_ends_session() {
        let publisher = Arc::new(CollectingPublisher {
            fail_after: Some(1),
            ..Default::default()
        });
        let (scheduler, coordinator) = new_scheduler(Arc::clone(&publisher));
        scheduler.start(spaced_recording(), settings(1.0, 5)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(publisher.count(), 1);
        assert!(coordinator.is_idle());
        assert!(!scheduler.is_replaying());
    }
}
