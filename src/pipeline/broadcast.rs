//! Broadcast publisher: fans replayed events out to every subscriber
//! (the WebSocket event stream, tests, in-process consumers).

use crate::data::Event;
use crate::error::Result;
use crate::pipeline::EventPublisher;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Event>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventPublisher for BroadcastPublisher {
    /// Having no subscribers is not an error: the event is simply not observed.
    fn publish(&self, event: &Event) -> Result<()> {
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!("Replayed event {} had no subscribers", event.id);
        }
        Ok(())
    }
}
