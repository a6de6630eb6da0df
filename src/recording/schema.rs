//! Recording request/status shapes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body of `POST /record`. Values are validated at the request boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    /// Recording duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_limit: Option<i64>,
}

/// Validated stop conditions for a recording. At least one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingLimits {
    pub duration: Option<Duration>,
    pub event_limit: Option<u64>,
}

impl RecordingLimits {
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            event_limit: None,
        }
    }

    pub fn with_event_limit(limit: u64) -> Self {
        Self {
            duration: None,
            event_limit: Some(limit),
        }
    }
}

/// Body of `GET /record`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStatus {
    pub in_progress: bool,
    pub event_count: u64,
    /// Elapsed recording time in seconds.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_limit: Option<u64>,
}
