use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Replay settings
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Require `X-API-Key` on every route except ping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Largest accepted `POST /data` body
    #[serde(default = "default_import_body_limit")]
    pub import_body_limit_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
            max_concurrent_requests: default_max_concurrent_requests(),
            import_body_limit_bytes: default_import_body_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// zlib/gzip level, 0-9
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Replayed events buffered per stream subscriber
    #[serde(default = "default_event_stream_capacity")]
    pub event_stream_capacity: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            event_stream_capacity: default_event_stream_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    59712
}

fn default_max_concurrent_requests() -> usize {
    32
}

fn default_import_body_limit() -> usize {
    64 * 1024 * 1024
}

fn default_compression_level() -> u32 {
    crate::codec::DEFAULT_COMPRESSION_LEVEL
}

fn default_event_stream_capacity() -> usize {
    crate::pipeline::broadcast::DEFAULT_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}
