//! qrtist runtime configuration handling

use crate::compositor::RenderConfig;
use crate::error::{Error, Result};
use crate::gate::DEFAULT_VISIBLE_LIMIT;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrtistConfig {
    /// Logging configuration
    pub logging: LoggingOptions,
    /// Link registry configuration
    pub registry: RegistryOptions,
    /// Compositor configuration
    pub render: RenderOptions,
    /// HTTP server configuration
    pub server: ServerOptions,
}

impl QrtistConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No qrtist.toml / qrtist.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["qrtist.toml", "qrtist.yaml", "qrtist.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("qrtist");
            for candidate in ["config.toml", "config.yaml"] {
                let path = base.join(candidate);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            }),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            }),
            other => Err(Error::Config(format!(
                "Unsupported config format '{}', expected toml/yaml",
                other
            ))),
        }
    }

    /// Apply environment variable overrides after file/default loading.
    fn apply_env_overrides(&mut self) {
        self.logging.apply_env_overrides();
        self.registry.apply_env_overrides();
        self.render.apply_env_overrides();
        self.server.apply_env_overrides();
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        self.render_config()?;
        if self.registry.base_url.trim().is_empty() {
            return Err(Error::Config("registry.base_url must not be empty".to_string()));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(Error::Config(
                "server.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Produce a validated compositor configuration.
    pub fn render_config(&self) -> Result<RenderConfig> {
        self.render.to_render_config()
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `QRTIST_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in stdout logging
    pub color: bool,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            color: true,
            rotation: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("QRTIST_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("QRTIST_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Ok(color) = env::var("QRTIST_LOG_COLOR") {
            if let Some(value) = parse_flag(&color) {
                self.color = value;
            }
        }
        if let Ok(rotation) = env::var("QRTIST_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::from_str(&rotation) {
                self.rotation = Some(parsed);
            }
        }
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    fn from_str(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}

/// Link registry storage and presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// SQLite database file
    pub database: PathBuf,
    /// Prefix joined with a link id to form the short URL encoded in QR codes
    pub base_url: String,
    /// Links shown to instances that have not purchased pro
    pub visible_limit: usize,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            database: PathBuf::from("qrtist.db"),
            base_url: "http://127.0.0.1:9233/s/".to_string(),
            visible_limit: DEFAULT_VISIBLE_LIMIT,
        }
    }
}

impl RegistryOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(database) = env::var("QRTIST_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Ok(base_url) = env::var("QRTIST_BASE_URL") {
            self.base_url = base_url;
        }
        if let Ok(limit) = env::var("QRTIST_VISIBLE_LIMIT") {
            if let Ok(parsed) = limit.parse::<usize>() {
                self.visible_limit = parsed;
            }
        }
    }

    /// Short URL for a link id; this is what gets encoded, never the target.
    pub fn short_url(&self, id: &str) -> String {
        if self.base_url.ends_with('/') {
            format!("{}{id}", self.base_url)
        } else {
            format!("{}/{id}", self.base_url)
        }
    }
}

/// Compositor overrides merged on top of `RenderConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Override for the output canvas size in pixels
    pub output_size: Option<u32>,
    /// Override for the dot radius as a fraction of the cell size
    pub dot_radius_ratio: Option<f32>,
    /// Override for dot opacity
    pub dot_opacity: Option<f32>,
    /// Decode every render before returning it
    pub verify: Option<bool>,
}

impl RenderOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(size) = env::var("QRTIST_RENDER_SIZE") {
            self.output_size = size.parse::<u32>().ok();
        }
        if let Ok(ratio) = env::var("QRTIST_RENDER_DOT_RADIUS") {
            self.dot_radius_ratio = ratio.parse::<f32>().ok();
        }
        if let Ok(opacity) = env::var("QRTIST_RENDER_DOT_OPACITY") {
            self.dot_opacity = opacity.parse::<f32>().ok();
        }
        if let Ok(verify) = env::var("QRTIST_RENDER_VERIFY") {
            self.verify = parse_flag(&verify);
        }
    }

    /// Merge overrides onto the default render configuration.
    pub fn to_render_config(&self) -> Result<RenderConfig> {
        let mut config = RenderConfig::default();

        if let Some(size) = self.output_size {
            config.output_size = size;
        }
        if let Some(ratio) = self.dot_radius_ratio {
            config.dot_radius_ratio = ratio;
        }
        if let Some(opacity) = self.dot_opacity {
            config.dot_opacity = opacity;
        }
        if let Some(verify) = self.verify {
            config.verify = verify;
        }

        config.validate()?;
        Ok(config)
    }
}

/// HTTP boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Bind address for the HTTP server
    pub bind_address: String,
    /// Bind port for the HTTP server
    pub port: u16,
    /// Deadline for each registry operation, in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 9233,
            request_timeout_ms: 5_000,
        }
    }
}

impl ServerOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(addr) = env::var("QRTIST_BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Ok(port) = env::var("QRTIST_BIND_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                self.port = parsed;
            }
        }
        if let Ok(timeout) = env::var("QRTIST_REQUEST_TIMEOUT_MS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                self.request_timeout_ms = parsed;
            }
        }
    }

    /// Socket address helper for binding servers
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Per-request deadline
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}
