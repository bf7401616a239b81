// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub camera: CameraConfig,
    pub routes: RoutesConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (common or json)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "common".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PerformanceConfig {
    /// Seconds a client may take to send request headers
    pub header_read_timeout: u64,
    /// Seconds one stream write may wait on a client that is not reading
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// Which frame source backs the camera
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Synthetic,
    Directory,
    V4l2,
}

/// Camera configuration
///
/// Source-specific keys are ignored by the other sources.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    pub source: SourceKind,
    /// Maximum number of frames handed out at once
    pub pool_size: usize,
    /// How long a request waits for a free frame slot
    pub acquire_timeout_ms: u64,
    /// Upper bound on frame rate of each stream (0 = unthrottled)
    pub fps: u32,
    /// Consecutive failed acquisitions before a stream gives up (0 = never)
    pub retry_max_attempts: u32,
    pub retry_delay_ms: u64,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub directory: String,
    pub device: String,
    pub buffer_count: u32,
}

/// Routes configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RoutesConfig {
    pub capture_path: String,
    pub stream_path: String,
    pub health_path: String,
    /// Serve an HTML viewer at `/`
    pub index_page: bool,
}
