//! Replay request/status shapes.

use serde::{Deserialize, Serialize};

/// Body of `POST /replay`. Missing fields default to zero and are rejected
/// (rate) or accepted (repeat count) by validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRequest {
    #[serde(default)]
    pub replay_rate: f64,
    #[serde(default)]
    pub repeat_count: i64,
}

/// Validated replay parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySettings {
    /// Speed multiplier, > 0. 2.0 halves every gap, 0.5 doubles it.
    pub rate: f64,
    /// Additional passes after the first.
    pub repeat_count: u32,
}

impl ReplaySettings {
    pub fn total_passes(&self) -> u64 {
        1 + u64::from(self.repeat_count)
    }
}

/// Body of `GET /replay`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStatus {
    pub running: bool,
    /// 1-based pass number, 0 when idle.
    pub current_pass: u64,
    pub total_passes: u64,
    /// Events emitted in the current pass.
    pub event_count: u64,
    pub events_per_pass: u64,
    pub replay_rate: f64,
    /// Elapsed replay time in seconds.
    pub duration: f64,
}
