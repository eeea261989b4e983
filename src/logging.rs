//! Logging setup
//!
//! Human-readable output goes to stderr; `RUST_LOG` overrides the configured
//! level. With a file path configured, a second layer writes plain text to a
//! daily rotated file next to it.

use crate::config::LoggingConfig;
use crate::error::{MonitorError, Result};
use std::ffi::OsStr;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Parse a level name such as `info` or `DEBUG`
pub fn parse_level(level: &str) -> Result<Level> {
    level
        .trim()
        .parse::<Level>()
        .map_err(|_| MonitorError::config(format!("invalid log level '{level}'")))
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(parse_level(&config.level)?.into())
        .from_env_lossy();

    let (compact_layer, json_layer) = if config.json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(
                fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    };

    let file_layer = match &config.file_path {
        Some(file_path) => {
            let dir = file_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::daily(
                dir,
                file_path
                    .file_name()
                    .unwrap_or_else(|| OsStr::new("hydroponic-monitor.log")),
            );
            Some(fmt::layer().with_ansi(false).with_writer(appender))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(compact_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| MonitorError::config(format!("failed to install logger: {e}")))
}
