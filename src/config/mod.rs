// Configuration module entry point
// Loads layered configuration: defaults, config file, environment

mod types;

use std::net::SocketAddr;
use std::time::Duration;

pub use types::{
    CameraConfig, Config, LoggingConfig, PerformanceConfig, RoutesConfig, ServerConfig,
    SourceKind,
};

/// Default config file (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from `CAMERA_CONFIG` or the default `config.toml`
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var("CAMERA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// Environment variables override the file, e.g. `CAMERA_SERVER__PORT=9000`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("CAMERA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Build configuration from defaults plus an inline TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
    {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 80)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "common")?
            .set_default("performance.header_read_timeout", 10)?
            .set_default("performance.write_timeout", 10)?
            .set_default("camera.source", "synthetic")?
            .set_default("camera.pool_size", 2)?
            .set_default("camera.acquire_timeout_ms", 2000)?
            .set_default("camera.fps", 15)?
            .set_default("camera.retry_max_attempts", 50)?
            .set_default("camera.retry_delay_ms", 20)?
            .set_default("camera.width", 320)?
            .set_default("camera.height", 240)?
            .set_default("camera.quality", 80)?
            .set_default("camera.directory", "frames")?
            .set_default("camera.device", "/dev/video0")?
            .set_default("camera.buffer_count", 4)?
            .set_default("routes.capture_path", "/capture")?
            .set_default("routes.stream_path", "/stream")?
            .set_default("routes.health_path", "/healthz")?
            .set_default("routes.index_page", true)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address '{}:{}': {e}", self.server.host, self.server.port))
    }
}

impl PerformanceConfig {
    pub const fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }
}

impl CameraConfig {
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Minimum spacing between frames, `None` when unthrottled
    pub fn frame_interval(&self) -> Option<Duration> {
        (self.fps > 0).then(|| Duration::from_secs(1) / self.fps)
    }
}
