//! Hydroponic monitor: ingest and dashboard API for pH/EC sensor nodes
//!
//! Two monitor nodes report over HTTP: a pH node (air and water temperature,
//! humidities, pH) and an EC node (conductivity, probe voltage, solution
//! temperature). Each submission is validated, timestamped and stored as the
//! latest reading of its class plus a bounded history. The dashboard polls a
//! combined view built from the latest readings.
//!
//! # Features
//!
//! - `http-server` (default): axum HTTP API and the server binary
//! - `turso`: shared storage in a Turso / libSQL database

pub mod aggregator;
pub mod config;
pub mod error;
#[cfg(feature = "http-server")]
pub mod http_transport;
pub mod logging;
pub mod models;
pub mod storage;
pub mod validation;

// Re-export main types for convenience
pub use aggregator::{compose, DashboardPayload, DashboardSettings};
pub use config::ServerConfig;
pub use error::{MonitorError, Result};
#[cfg(feature = "http-server")]
pub use http_transport::HttpServer;
pub use models::{DeviceClass, Measurements, StoreSnapshot, StoredReading};
pub use storage::{create_store, ReadingStore};
