//! Configuration management for the hydroponic monitor
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `HYDRO_*` environment variables. The binary applies CLI flags last.

use crate::aggregator::DashboardSettings;
use crate::error::{MonitorError, Result};
use crate::models::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs, time::Duration};
use tracing::debug;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listener configuration
    pub server: HttpConfig,

    /// Reading store configuration
    pub storage: StorageConfig,

    /// Derived-value constants for the dashboard payload
    pub dashboard: DashboardSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Which medium holds the readings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory
    Memory,
    /// JSON scratch file
    #[default]
    File,
    /// Turso / libSQL database
    Turso,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::File => "file",
            StorageBackend::Turso => "turso",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "turso" | "libsql" => Ok(Self::Turso),
            other => Err(MonitorError::config(format!(
                "unknown storage backend '{other}' (expected memory, file or turso)"
            ))),
        }
    }
}

/// Reading store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use
    pub backend: StorageBackend,

    /// Path of the JSON document (file backend)
    pub data_file: PathBuf,

    /// Database URL: a local path, `file:` URL or `libsql://` URL (turso backend)
    pub database_url: Option<String>,

    /// Auth token for remote databases
    pub auth_token: Option<String>,

    /// Readings kept per device class
    pub history_limit: usize,

    /// Budget for a single database round trip
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_file: env::temp_dir().join("sensor_data.json"),
            database_url: None,
            auth_token: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is unset
    pub level: String,

    /// Optional log file (rotated daily)
    pub file_path: Option<PathBuf>,

    /// Emit JSON lines instead of compact text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            json: false,
        }
    }
}

impl ServerConfig {
    /// Default config file location (`<config dir>/hydroponic-monitor/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hydroponic-monitor").join("config.toml"))
    }

    /// Parse a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MonitorError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| MonitorError::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is used
    /// if present, otherwise built-in defaults. Environment overrides are
    /// applied on top in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => {
                    debug!("Loading configuration from {}", path.display());
                    Self::from_file(path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Create configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `HYDRO_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = env::var("HYDRO_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = env::var("HYDRO_PORT") {
            self.server.port = parse_env("HYDRO_PORT", &port)?;
        }

        if let Ok(backend) = env::var("HYDRO_STORAGE") {
            self.storage.backend = backend.parse()?;
        }

        if let Ok(path) = env::var("HYDRO_DATA_FILE") {
            self.storage.data_file = PathBuf::from(path);
        }

        if let Ok(url) = env::var("HYDRO_DATABASE_URL") {
            self.storage.database_url = Some(url);
        }

        if let Ok(token) = env::var("HYDRO_DATABASE_TOKEN") {
            self.storage.auth_token = Some(token);
        }

        if let Ok(limit) = env::var("HYDRO_HISTORY_LIMIT") {
            self.storage.history_limit = parse_env("HYDRO_HISTORY_LIMIT", &limit)?;
        }

        if let Ok(factor) = env::var("HYDRO_TDS_FACTOR") {
            self.dashboard.tds_factor = parse_env("HYDRO_TDS_FACTOR", &factor)?;
        }

        if let Ok(path) = env::var("HYDRO_LOG_FILE") {
            self.logging.file_path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(MonitorError::config("server.port must be non-zero"));
        }

        if self.storage.history_limit == 0 {
            return Err(MonitorError::config("storage.history_limit must be at least 1"));
        }

        if self.storage.timeout.is_zero() {
            return Err(MonitorError::config("storage.timeout must be non-zero"));
        }

        let factor = self.dashboard.tds_factor;
        if !factor.is_finite() || factor < 0.0 {
            return Err(MonitorError::config(format!(
                "dashboard.tds_factor must be a non-negative number, got {factor}"
            )));
        }

        if self.storage.backend == StorageBackend::Turso
            && self.storage.database_url.as_deref().map_or(true, str::is_empty)
        {
            return Err(MonitorError::config(
                "storage.database_url is required for the turso backend",
            ));
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MonitorError::config(format!("{name} has an invalid value: '{value}'")))
}
