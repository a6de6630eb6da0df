use crate::data::{Device, DeviceProfile};
use crate::error::Result;
use crate::pipeline::MetadataRegistry;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local device/profile registry.
#[derive(Default)]
pub struct InMemoryRegistry {
    devices: RwLock<HashMap<String, Device>>,
    profiles: RwLock<HashMap<String, DeviceProfile>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(&self, name: &str) -> Option<Device> {
        self.devices.read().get(name).cloned()
    }

    pub fn profile(&self, name: &str) -> Option<DeviceProfile> {
        self.profiles.read().get(name).cloned()
    }

    #[cfg(test)]
    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }
}

impl MetadataRegistry for InMemoryRegistry {
    fn contains_device(&self, name: &str) -> bool {
        self.devices.read().contains_key(name)
    }

    fn contains_profile(&self, name: &str) -> bool {
        self.profiles.read().contains_key(name)
    }

    fn upsert_device(&self, device: Device) -> Result<()> {
        self.devices.write().insert(device.name.clone(), device);
        Ok(())
    }

    fn upsert_profile(&self, profile: DeviceProfile) -> Result<()> {
        self.profiles.write().insert(profile.name.clone(), profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::fixtures::{device, profile};

    #[test]
    fn test_upsert_replaces_by_name() {
        let registry = InMemoryRegistry::new();
        registry.upsert_device(device("d1", "p1")).unwrap();
        registry.upsert_device(device("d1", "p2")).unwrap();
        assert_eq!(registry.device_count(), 1);
        assert_eq!(registry.device("d1").unwrap().profile_name, "p2");

        registry.upsert_profile(profile("p1")).unwrap();
        assert!(registry.contains_profile("p1"));
        assert!(!registry.contains_profile("p2"));
    }
}
