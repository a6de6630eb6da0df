use crate::config::schema::AppConfig;
use crate::error::{RecordReplayError, Result};
use std::str::FromStr;

/// Validate a loaded configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.service.host.trim().is_empty() {
        return Err(RecordReplayError::Validation(
            "service.host cannot be empty".to_string(),
        ));
    }

    if config.service.port == 0 {
        return Err(RecordReplayError::Validation(
            "service.port must be non-zero".to_string(),
        ));
    }

    if config.service.api_key.as_deref().is_some_and(|k| k.is_empty()) {
        return Err(RecordReplayError::Validation(
            "service.api_key cannot be empty when set".to_string(),
        ));
    }

    if config.service.max_concurrent_requests == 0 {
        return Err(RecordReplayError::Validation(
            "service.max_concurrent_requests must be > 0".to_string(),
        ));
    }

    if config.service.import_body_limit_bytes == 0 {
        return Err(RecordReplayError::Validation(
            "service.import_body_limit_bytes must be > 0".to_string(),
        ));
    }

    if config.export.compression_level > 9 {
        return Err(RecordReplayError::Validation(format!(
            "export.compression_level {} out of range 0-9",
            config.export.compression_level
        )));
    }

    if config.replay.event_stream_capacity == 0 {
        return Err(RecordReplayError::Validation(
            "replay.event_stream_capacity must be > 0".to_string(),
        ));
    }

    parse_log_level(&config.logging.level)?;

    Ok(())
}

/// Parse `logging.level` into a tracing level
pub fn parse_log_level(level: &str) -> Result<tracing::Level> {
    tracing::Level::from_str(level).map_err(|_| {
        RecordReplayError::Validation(format!(
            "Invalid log level: {}. Must be one of trace, debug, info, warn, error",
            level
        ))
    })
}
