//! Host pipeline collaborators: inbound event delivery shape, outbound
//! publishing, and the device/profile registry targeted by imports.

pub mod broadcast;
pub mod registry;

pub use broadcast::BroadcastPublisher;
pub use registry::InMemoryRegistry;

use crate::data::{Device, DeviceProfile, Event};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A decoded event delivered by the pipeline with its metadata attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub event: Event,
    pub device: Device,
    pub profile: DeviceProfile,
}

/// Outbound side of the pipeline: accepts one event at a time for re-emission.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &Event) -> Result<()>;
}

/// Device and profile definitions known to the host.
pub trait MetadataRegistry: Send + Sync {
    fn contains_device(&self, name: &str) -> bool;
    fn contains_profile(&self, name: &str) -> bool;
    fn upsert_device(&self, device: Device) -> Result<()>;
    fn upsert_profile(&self, profile: DeviceProfile) -> Result<()>;
}
