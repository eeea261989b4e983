//! In-memory reading storage
//!
//! Data lives for the lifetime of the process.

use super::ReadingStore;
use crate::error::Result;
use crate::models::{Measurements, StoreSnapshot, StoredReading};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-memory reading store
#[derive(Debug, Clone)]
pub struct MemoryReadingStore {
    state: Arc<RwLock<StoreSnapshot>>,
    history_limit: usize,
}

impl MemoryReadingStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreSnapshot::default())),
            history_limit,
        }
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn save(
        &self,
        measurements: Measurements,
        device_id: Option<String>,
    ) -> Result<StoredReading> {
        let mut state = self.state.write().await;
        let reading = state.apply(measurements, device_id, Utc::now(), self.history_limit);
        debug!(
            "Stored {} reading in memory ({} in history)",
            measurements.device_class(),
            state.history_len(measurements.device_class())
        );
        Ok(reading)
    }

    async fn get_latest(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
