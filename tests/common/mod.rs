//! Shared fixtures for integration tests

#![allow(dead_code)]

use hydroponic_monitor::config::{StorageBackend, StorageConfig};
use hydroponic_monitor::models::{EcMeasurements, Measurements, PhMeasurements};
use rstest::fixture;
use serde_json::{json, Value};

/// A typical pH monitor submission
pub fn ph_body() -> Value {
    json!({
        "device_id": "ESP32_PH",
        "temp1": 25.5,
        "hum1": 65,
        "temp2": 24.8,
        "hum2": 70,
        "ph_val": 6.5
    })
}

/// A typical EC monitor submission
pub fn ec_body() -> Value {
    json!({
        "device_id": "ESP32_EC",
        "ec_value": 1200,
        "voltage": 1.85,
        "temperature": 25.0
    })
}

pub fn ph(ph_value: f64) -> Measurements {
    Measurements::Ph(PhMeasurements {
        temp1: 25.5,
        hum1: 65.0,
        temp2: 24.8,
        hum2: 70.0,
        ph_value,
    })
}

pub fn ec(ec_value: f64) -> Measurements {
    Measurements::Ec(EcMeasurements {
        ec_value,
        voltage: 1.85,
        temperature: 25.0,
    })
}

/// Scratch directory removed when the test ends
#[fixture]
pub fn scratch() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

/// Storage config for `backend` rooted in `dir`
pub fn storage_config(backend: StorageBackend, dir: &tempfile::TempDir) -> StorageConfig {
    StorageConfig {
        backend,
        data_file: dir.path().join("sensor_data.json"),
        database_url: Some(dir.path().join("readings.db").display().to_string()),
        ..StorageConfig::default()
    }
}
