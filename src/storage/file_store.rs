//! JSON scratch-file reading storage
//!
//! The whole store is one JSON document. A save loads the document, applies
//! the reading and writes the document back. Writes go to a uniquely named
//! sibling file which is then renamed over the target, so a reader never
//! sees a half-written document and concurrent writers resolve to the last
//! complete write.
//!
//! Both device classes share the one document. A pH save and an EC save
//! running at the same moment each write back the class they did not touch
//! as it was when they loaded, so the later write can drop the other class's
//! new reading. Deployments with concurrent writers should use the `memory`
//! or `turso` backend.

use super::ReadingStore;
use crate::error::{MonitorError, Result};
use crate::models::{Measurements, StoreSnapshot, StoredReading};
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Reading store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct FileReadingStore {
    path: PathBuf,
    history_limit: usize,
}

impl FileReadingStore {
    pub fn new(path: PathBuf, history_limit: usize) -> Self {
        info!("Using reading store file {}", path.display());
        Self {
            path,
            history_limit,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current document.
    ///
    /// A missing file is an empty store. An unreadable or unparsable file is
    /// logged and also treated as an empty store, so the next save replaces
    /// it instead of failing forever.
    async fn load(&self) -> StoreSnapshot {
        match self.try_load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Failed to read reading store {}: {} - using empty state",
                    self.path.display(),
                    e
                );
                StoreSnapshot::default()
            }
        }
    }

    async fn try_load(&self) -> Result<StoreSnapshot> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoreSnapshot::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn write(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MonitorError::storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let tmp = self.temp_path();
        if let Err(e) = tokio::fs::write(&tmp, &json).await {
            return Err(MonitorError::storage(format!("write failed: {e}")));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(MonitorError::storage(format!("replace failed: {e}")));
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sensor_data.json".to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl ReadingStore for FileReadingStore {
    async fn save(
        &self,
        measurements: Measurements,
        device_id: Option<String>,
    ) -> Result<StoredReading> {
        let class = measurements.device_class();
        let mut snapshot = self.load().await;
        let reading = snapshot.apply(measurements, device_id, Utc::now(), self.history_limit);

        if let Err(e) = self.write(&snapshot).await {
            error!("Failed to persist {} reading: {}", class, e);
            return Err(e);
        }

        debug!(
            "Persisted {} reading to {} ({} in history)",
            class,
            self.path.display(),
            snapshot.history_len(class)
        );
        Ok(reading)
    }

    async fn get_latest(&self) -> StoreSnapshot {
        self.load().await
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
