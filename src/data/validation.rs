//! Request-boundary validation. Everything here runs before the engine is
//! invoked and fails with `Validation`.

use crate::data::schema::RecordedData;
use crate::error::{RecordReplayError, Result};
use crate::recording::{RecordRequest, RecordingLimits};
use crate::replay::{ReplayRequest, ReplaySettings};
use std::time::Duration;

/// Validate a record request: at least one stop condition, every set value > 0.
pub fn validate_record_request(request: &RecordRequest) -> Result<RecordingLimits> {
    if request.duration.is_none() && request.event_limit.is_none() {
        return Err(RecordReplayError::Validation(
            "Duration and/or EventLimit must be set".to_string(),
        ));
    }

    let duration = match request.duration {
        Some(secs) if !(secs.is_finite() && secs > 0.0) => {
            return Err(RecordReplayError::Validation(
                "Duration must be > 0 when set".to_string(),
            ));
        }
        Some(secs) => Some(Duration::try_from_secs_f64(secs).map_err(|e| {
            RecordReplayError::Validation(format!("Duration out of range: {}", e))
        })?),
        None => None,
    };

    let event_limit = match request.event_limit {
        Some(limit) if limit <= 0 => {
            return Err(RecordReplayError::Validation(
                "Event Limit must be > 0 when set".to_string(),
            ));
        }
        Some(limit) => Some(limit as u64),
        None => None,
    };

    Ok(RecordingLimits {
        duration,
        event_limit,
    })
}

/// Validate a replay request: rate > 0, repeat count >= 0.
pub fn validate_replay_request(request: &ReplayRequest) -> Result<ReplaySettings> {
    if !(request.replay_rate.is_finite() && request.replay_rate > 0.0) {
        return Err(RecordReplayError::Validation(
            "Replay Rate must be greater than 0".to_string(),
        ));
    }
    if request.repeat_count < 0 {
        return Err(RecordReplayError::Validation(
            "Repeat Count must be equal or greater than 0".to_string(),
        ));
    }
    let repeat_count = u32::try_from(request.repeat_count).map_err(|_| {
        RecordReplayError::Validation(format!(
            "Repeat Count must not exceed {}",
            u32::MAX
        ))
    })?;

    Ok(ReplaySettings {
        rate: request.replay_rate,
        repeat_count,
    })
}

/// Validate an imported recording: non-empty events, devices and profiles,
/// and every reference resolvable inside the payload.
pub fn validate_import(data: &RecordedData) -> Result<()> {
    if data.recorded_events.is_empty() {
        return Err(RecordReplayError::Validation(
            "no recorded data found: no recorded events".to_string(),
        ));
    }
    if data.devices.is_empty() {
        return Err(RecordReplayError::Validation(
            "no recorded data found: no devices".to_string(),
        ));
    }
    if data.profiles.is_empty() {
        return Err(RecordReplayError::Validation(
            "no recorded data found: no profiles".to_string(),
        ));
    }

    let missing = data.dangling_references();
    if !missing.is_empty() {
        return Err(RecordReplayError::Validation(format!(
            "recorded data references undefined metadata: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}
