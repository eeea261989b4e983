//! Hydroponic monitor server - main entry point
//!
//! Receives readings from the pH and EC monitor nodes over HTTP and serves
//! the dashboard payload.

use anyhow::Context;
use clap::Parser;
use hydroponic_monitor::{
    config::StorageBackend, create_store, logging, HttpServer, ServerConfig,
};
use std::path::PathBuf;
use tracing::info;

/// Hydroponic monitor server configuration
#[derive(Parser, Debug)]
#[command(name = "hydroponic-monitor-server")]
#[command(about = "Ingest API and dashboard feed for hydroponic pH/EC monitors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "HYDRO_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Storage backend (memory, file or turso)
    #[arg(long, value_parser = parse_backend)]
    storage: Option<StorageBackend>,

    /// JSON file used by the file backend
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Database URL used by the turso backend
    #[arg(long)]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    /// Layer command line flags over file and environment configuration
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(backend) = self.storage {
            config.storage.backend = backend;
        }
        if let Some(path) = self.data_file {
            config.storage.data_file = path;
        }
        if let Some(url) = self.database_url {
            config.storage.database_url = Some(url);
        }
        if self.debug {
            config.logging.level = "debug".to_string();
        }
    }
}

fn parse_backend(value: &str) -> std::result::Result<StorageBackend, String> {
    value.parse().map_err(|e: hydroponic_monitor::MonitorError| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);

    logging::init_logging(&config.logging).context("Failed to initialize logging")?;
    config.validate().context("Invalid configuration")?;

    info!(
        "Starting hydroponic monitor v{} ({} storage)",
        env!("CARGO_PKG_VERSION"),
        config.storage.backend.as_str()
    );

    let store = create_store(&config.storage)
        .await
        .context("Failed to initialize reading store")?;

    HttpServer::new(config.server, store, config.dashboard)
        .start()
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}
