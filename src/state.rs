use crate::codec::CodecGateway;
use crate::config::AppConfig;
use crate::data::DataManager;
use crate::pipeline::{BroadcastPublisher, InMemoryRegistry};
use std::sync::Arc;

/// Application global state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub data_manager: Arc<DataManager>,
    /// Device/profile definitions registered by imports.
    pub registry: Arc<InMemoryRegistry>,
    /// Outbound pipeline: replayed events, also streamed over WebSocket.
    pub event_stream: BroadcastPublisher,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let event_stream = BroadcastPublisher::new(config.replay.event_stream_capacity);
        let registry = Arc::new(InMemoryRegistry::new());
        let data_manager = DataManager::new(
            Arc::new(event_stream.clone()),
            registry.clone(),
            CodecGateway::new(config.export.compression_level),
        );
        Self {
            config: Arc::new(config),
            data_manager: Arc::new(data_manager),
            registry,
            event_stream,
        }
    }
}
