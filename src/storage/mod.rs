//! Reading store: latest value plus bounded history per device class
//!
//! Available implementations:
//! - In-memory storage (lost on restart)
//! - JSON scratch file (default; survives restarts of the same host)
//! - Turso / libSQL database (with "turso" feature) for shared deployments
//!
//! Saves follow a read-modify-write cycle with last-write-wins semantics;
//! there is no locking across requests. Reads never fail: an unreadable
//! medium is logged and reported as an empty store.

pub mod file_store;
pub mod memory;

#[cfg(feature = "turso")]
pub mod turso_client;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{MonitorError, Result};
use crate::models::{Measurements, StoreSnapshot, StoredReading};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub use file_store::FileReadingStore;
pub use memory::MemoryReadingStore;

#[cfg(feature = "turso")]
pub use turso_client::TursoReadingStore;

/// Persistence for sensor readings
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Store a reading for `measurements`' device class.
    ///
    /// Assigns the timestamp, replaces the class's latest reading, appends to
    /// its history and trims the history to the configured limit.
    async fn save(
        &self,
        measurements: Measurements,
        device_id: Option<String>,
    ) -> Result<StoredReading>;

    /// Latest readings and histories for both device classes
    async fn get_latest(&self) -> StoreSnapshot;

    /// Release the backing medium. Later calls may fail.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Build the store selected by configuration
pub async fn create_store(config: &StorageConfig) -> Result<Arc<dyn ReadingStore>> {
    if config.history_limit == 0 {
        return Err(MonitorError::config("history_limit must be at least 1"));
    }

    let store: Arc<dyn ReadingStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryReadingStore::new(config.history_limit)),
        StorageBackend::File => Arc::new(FileReadingStore::new(
            config.data_file.clone(),
            config.history_limit,
        )),
        #[cfg(feature = "turso")]
        StorageBackend::Turso => Arc::new(TursoReadingStore::new(config.clone())?),
        #[cfg(not(feature = "turso"))]
        StorageBackend::Turso => {
            return Err(MonitorError::config(
                "turso storage requested but the binary was built without the \"turso\" feature",
            ))
        }
    };

    info!(
        "Initialized {} reading store (history limit {})",
        store.backend_name(),
        config.history_limit
    );
    Ok(store)
}
