use crate::coordinator::SessionState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("another session is active: {0}")]
    SessionBusy(SessionState),

    #[error("no recording in progress")]
    NotRecording,

    #[error("no replay in progress")]
    NotReplaying,

    #[error("no recorded data available: {0}")]
    NoDataAvailable(String),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("malformed recorded data: {0}")]
    MalformedData(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("metadata conflict: {0}")]
    MetadataConflict(String),

    #[error("compression format not supported: {0}")]
    UnsupportedCompression(String),

    #[error("failed to publish event: {0}")]
    Publish(String),
}

pub type Result<T> = std::result::Result<T, RecordReplayError>;
