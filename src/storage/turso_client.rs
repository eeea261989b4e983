//! Turso / libSQL reading storage
//!
//! For deployments where several server instances share one database.
//! The connection is opened on first use and reused for the lifetime of
//! the store; `close()` releases it. Every database round trip runs under
//! the configured timeout, and an elapsed timeout is reported, not retried.

use super::ReadingStore;
use crate::config::StorageConfig;
use crate::error::{MonitorError, Result};
use crate::models::{
    not_before, DeviceClass, EcReading, Measurements, PhReading, Reading, StoreSnapshot,
    StoredReading,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sensor_readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        device_class TEXT NOT NULL,
        payload TEXT NOT NULL,
        recorded_at TEXT NOT NULL
    )
"#;

const INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_readings_class_id ON sensor_readings(device_class, id DESC)";

/// Open database plus its single shared connection
struct DbHandle {
    // Kept alive for as long as the connection is in use
    _database: Database,
    connection: Connection,
}

/// Reading store backed by a libSQL database
pub struct TursoReadingStore {
    config: StorageConfig,
    handle: Mutex<Option<Arc<DbHandle>>>,
    closed: AtomicBool,
}

impl TursoReadingStore {
    /// Create the store. No connection is made until the first operation.
    pub fn new(config: StorageConfig) -> Result<Self> {
        if config.database_url.as_deref().map_or(true, str::is_empty) {
            return Err(MonitorError::config(
                "database_url is required for turso storage",
            ));
        }
        Ok(Self {
            config,
            handle: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Shared connection, opened once on first use
    async fn handle(&self) -> Result<Arc<DbHandle>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MonitorError::storage("reading store is closed"));
        }

        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.as_ref() {
            return Ok(handle.clone());
        }

        let handle = Arc::new(self.open().await?);
        *guard = Some(handle.clone());
        Ok(handle)
    }

    async fn open(&self) -> Result<DbHandle> {
        let url = self.config.database_url.clone().unwrap_or_default();
        info!("Opening libSQL database {}", redact(&url));

        let database = if url.starts_with("libsql://") || url.starts_with("https://") {
            let token = self
                .config
                .auth_token
                .clone()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    MonitorError::config("Auth token required for remote Turso database")
                })?;
            self.timed("connect", libsql::Builder::new_remote(url, token).build())
                .await?
        } else {
            let path = url.strip_prefix("file:").unwrap_or(&url).to_string();
            self.timed("open", libsql::Builder::new_local(path).build())
                .await?
        };

        let connection = database
            .connect()
            .map_err(|e| MonitorError::storage(format!("Failed to create connection: {e}")))?;

        self.timed("create table", connection.execute(SCHEMA, ()))
            .await?;
        if let Err(e) = self.timed("create index", connection.execute(INDEX, ())).await {
            warn!("Failed to create reading index: {}", e);
        }

        debug!("libSQL schema ready");
        Ok(DbHandle {
            _database: database,
            connection,
        })
    }

    /// Run one database round trip under the configured timeout
    async fn timed<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, libsql::Error>>,
    {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(MonitorError::storage(format!("{what} failed: {e}"))),
            Err(_) => Err(MonitorError::timeout(format!(
                "{what} exceeded {:?}",
                self.config.timeout
            ))),
        }
    }

    async fn last_recorded_at(
        &self,
        conn: &Connection,
        class: DeviceClass,
    ) -> Result<Option<DateTime<Utc>>> {
        let value = self
            .timed("latest timestamp query", async {
                let mut rows = conn
                    .query(
                        "SELECT recorded_at FROM sensor_readings WHERE device_class = ?1 ORDER BY id DESC LIMIT 1",
                        libsql::params![class.as_str()],
                    )
                    .await?;
                match rows.next().await? {
                    Some(row) => Ok::<_, libsql::Error>(Some(row.get::<String>(0)?)),
                    None => Ok(None),
                }
            })
            .await?;

        Ok(value.and_then(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|t| t.with_timezone(&Utc))
                .ok()
        }))
    }

    async fn history<M: DeserializeOwned>(
        &self,
        conn: &Connection,
        class: DeviceClass,
    ) -> Result<Vec<Reading<M>>> {
        let limit = self.config.history_limit as i64;
        let payloads = self
            .timed("history query", async {
                let mut rows = conn
                    .query(
                        "SELECT payload FROM sensor_readings WHERE device_class = ?1 ORDER BY id DESC LIMIT ?2",
                        libsql::params![class.as_str(), limit],
                    )
                    .await?;
                let mut out = Vec::new();
                while let Some(row) = rows.next().await? {
                    out.push(row.get::<String>(0)?);
                }
                Ok::<_, libsql::Error>(out)
            })
            .await?;

        let mut readings = Vec::with_capacity(payloads.len());
        // Rows arrive newest first; history is oldest first
        for payload in payloads.iter().rev() {
            match serde_json::from_str(payload) {
                Ok(reading) => readings.push(reading),
                Err(e) => warn!("Skipping unreadable {} row: {}", class, e),
            }
        }
        Ok(readings)
    }

    async fn load_snapshot(&self) -> Result<StoreSnapshot> {
        let handle = self.handle().await?;
        let conn = &handle.connection;
        let ph_history: Vec<PhReading> = self.history(conn, DeviceClass::Ph).await?;
        let ec_history: Vec<EcReading> = self.history(conn, DeviceClass::Ec).await?;
        Ok(StoreSnapshot {
            ph_latest: ph_history.last().cloned(),
            ec_latest: ec_history.last().cloned(),
            ph_history,
            ec_history,
        })
    }
}

#[async_trait]
impl ReadingStore for TursoReadingStore {
    async fn save(
        &self,
        measurements: Measurements,
        device_id: Option<String>,
    ) -> Result<StoredReading> {
        let class = measurements.device_class();
        let handle = self.handle().await?;
        let conn = &handle.connection;

        let previous = match self.last_recorded_at(conn, class).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!("Failed to load latest {} reading: {} - assuming none", class, e);
                None
            }
        };

        let reading = Reading::new(measurements, device_id, not_before(Utc::now(), previous));
        let payload = serde_json::to_string(&reading)?;
        let recorded_at = reading.recorded_at.to_rfc3339();
        let limit = self.config.history_limit as i64;

        self.timed(
            "insert reading",
            conn.execute(
                "INSERT INTO sensor_readings (device_class, payload, recorded_at) VALUES (?1, ?2, ?3)",
                libsql::params![class.as_str(), payload, recorded_at],
            ),
        )
        .await?;

        let pruned = self
            .timed(
                "prune history",
                conn.execute(
                    "DELETE FROM sensor_readings WHERE device_class = ?1 AND id NOT IN \
                     (SELECT id FROM sensor_readings WHERE device_class = ?1 ORDER BY id DESC LIMIT ?2)",
                    libsql::params![class.as_str(), limit],
                ),
            )
            .await?;

        debug!("Stored {} reading in libSQL (pruned {})", class, pruned);
        Ok(reading)
    }

    async fn get_latest(&self) -> StoreSnapshot {
        match self.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to read readings from libSQL: {} - using empty state", e);
                StoreSnapshot::default()
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        if self.handle.lock().await.take().is_some() {
            info!("Closed libSQL reading store");
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "turso"
    }
}

/// Strip query strings (which may carry tokens) from a database URL for logs
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use crate::models::EcMeasurements;

    fn config(dir: &tempfile::TempDir, history_limit: usize) -> StorageConfig {
        StorageConfig {
            backend: StorageBackend::Turso,
            database_url: Some(dir.path().join("readings.db").display().to_string()),
            history_limit,
            ..StorageConfig::default()
        }
    }

    fn ec(value: f64) -> Measurements {
        Measurements::Ec(EcMeasurements {
            ec_value: value,
            voltage: 1.85,
            temperature: 25.0,
        })
    }

    #[test]
    fn test_requires_database_url() {
        let config = StorageConfig {
            backend: StorageBackend::Turso,
            database_url: None,
            ..StorageConfig::default()
        };
        assert!(TursoReadingStore::new(config).is_err());
    }

    #[tokio::test]
    async fn test_save_and_prune() {
        let dir = tempfile::tempdir().unwrap();
        let store = TursoReadingStore::new(config(&dir, 3)).unwrap();

        for i in 0..5 {
            store.save(ec(1000.0 + i as f64), None).await.unwrap();
        }

        let snapshot = store.get_latest().await;
        assert_eq!(snapshot.history_len(DeviceClass::Ec), 3);
        let values: Vec<f64> = snapshot
            .ec_history
            .iter()
            .map(|r| r.measurements.ec_value)
            .collect();
        assert_eq!(values, vec![1002.0, 1003.0, 1004.0]);
        assert_eq!(snapshot.ec_latest.unwrap().measurements.ec_value, 1004.0);
        assert!(snapshot.ph_latest.is_none());
    }

    #[tokio::test]
    async fn test_closed_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TursoReadingStore::new(config(&dir, 100)).unwrap();
        store.save(ec(1200.0), None).await.unwrap();
        store.close().await.unwrap();

        assert!(store.save(ec(1300.0), None).await.unwrap_err().is_storage_error());
        assert_eq!(store.get_latest().await, StoreSnapshot::default());
    }

    #[tokio::test]
    async fn test_elapsed_timeout_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TursoReadingStore::new(StorageConfig {
            timeout: std::time::Duration::from_millis(10),
            ..config(&dir, 100)
        })
        .unwrap();

        let err = store
            .timed(
                "stalled query",
                std::future::pending::<std::result::Result<(), libsql::Error>>(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::Timeout(_)));
        assert!(err.is_storage_error());
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("libsql://db.turso.io?authToken=abc"), "libsql://db.turso.io");
        assert_eq!(redact("readings.db"), "readings.db");
    }
}
