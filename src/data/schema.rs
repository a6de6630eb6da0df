//! Event and metadata model captured by a recording, plus the export unit.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One captured telemetry message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    pub device_name: String,
    pub profile_name: String,
    pub source_name: String,
    /// Origin timestamp, nanoseconds since the Unix epoch.
    pub origin: i64,
    #[serde(default)]
    pub readings: Vec<Reading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, serde_json::Value>>,
}

/// A named value inside an event. Either `value` (scalar, string-encoded) or
/// `binary_value` carries the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(default)]
    pub id: String,
    pub origin: i64,
    pub device_name: String,
    pub resource_name: String,
    pub profile_name: String,
    pub value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub binary_value: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

/// Device definition referenced by captured events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_admin_state")]
    pub admin_state: String,
    #[serde(default = "default_operating_state")]
    pub operating_state: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<serde_json::Value>,
    pub service_name: String,
    pub profile_name: String,
    #[serde(default)]
    pub protocols: HashMap<String, HashMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, serde_json::Value>>,
}

fn default_admin_state() -> String {
    "UNLOCKED".to_string()
}

fn default_operating_state() -> String {
    "UP".to_string()
}

/// Device profile definition referenced by recorded devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub device_resources: Vec<DeviceResource>,
    #[serde(default)]
    pub device_commands: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_hidden: bool,
    pub properties: ResourceProperties,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceProperties {
    pub value_type: String,
    #[serde(default = "default_read_write")]
    pub read_write: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

fn default_read_write() -> String {
    "R".to_string()
}

/// The unit of export/import: captured events plus the metadata needed to
/// recreate their devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedData {
    #[serde(default)]
    pub recorded_events: Vec<Event>,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub profiles: Vec<DeviceProfile>,
}

impl RecordedData {
    pub fn is_empty(&self) -> bool {
        self.recorded_events.is_empty()
    }

    /// Names of event devices missing from `devices`, and device profiles
    /// missing from `profiles`.
    pub fn dangling_references(&self) -> Vec<String> {
        let device_names: HashSet<&str> = self.devices.iter().map(|d| d.name.as_str()).collect();
        let profile_names: HashSet<&str> =
            self.profiles.iter().map(|p| p.name.as_str()).collect();

        let mut missing = Vec::new();
        let mut seen = HashSet::new();
        for event in &self.recorded_events {
            if !device_names.contains(event.device_name.as_str())
                && seen.insert(format!("device {}", event.device_name))
            {
                missing.push(format!("device {}", event.device_name));
            }
        }
        for device in &self.devices {
            if !profile_names.contains(device.profile_name.as_str())
                && seen.insert(format!("profile {}", device.profile_name))
            {
                missing.push(format!("profile {}", device.profile_name));
            }
        }
        missing
    }
}

/// Serde adapter: `Option<Vec<u8>>` as a standard base64 string.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
