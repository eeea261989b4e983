//! Reading store behaviour shared by every backend

use hydroponic_monitor::config::StorageBackend;
use hydroponic_monitor::models::{DeviceClass, Measurements, StoreSnapshot};
use hydroponic_monitor::storage::{create_store, FileReadingStore, ReadingStore};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;

mod common;
use common::{ec, ph, scratch, storage_config};

#[rstest]
#[case::memory(StorageBackend::Memory)]
#[case::file(StorageBackend::File)]
#[tokio::test]
async fn test_empty_store_reads_as_default(#[case] backend: StorageBackend, scratch: TempDir) {
    let store = create_store(&storage_config(backend, &scratch)).await.unwrap();
    let snapshot = store.get_latest().await;

    assert_eq!(snapshot, StoreSnapshot::default());
    assert!(snapshot.ph_latest.is_none());
    assert!(snapshot.ec_history.is_empty());
}

#[rstest]
#[case::memory(StorageBackend::Memory)]
#[case::file(StorageBackend::File)]
#[tokio::test]
async fn test_latest_matches_saved_reading(#[case] backend: StorageBackend, scratch: TempDir) {
    let store = create_store(&storage_config(backend, &scratch)).await.unwrap();

    let saved = store
        .save(ph(6.5), Some("ESP32_PH".to_string()))
        .await
        .unwrap();
    let snapshot = store.get_latest().await;
    let latest = snapshot.ph_latest.clone().unwrap();

    assert_eq!(Measurements::Ph(latest.measurements), saved.measurements);
    assert_eq!(latest.recorded_at, saved.recorded_at);
    assert_eq!(latest.device_id.as_deref(), Some("ESP32_PH"));
    assert_eq!(snapshot.history_len(DeviceClass::Ph), 1);
    assert!(snapshot.ec_latest.is_none());
}

#[rstest]
#[case::memory(StorageBackend::Memory)]
#[case::file(StorageBackend::File)]
#[tokio::test]
async fn test_history_keeps_most_recent_hundred(
    #[case] backend: StorageBackend,
    scratch: TempDir,
) {
    let store = create_store(&storage_config(backend, &scratch)).await.unwrap();

    for i in 0..150 {
        store.save(ec(i as f64), None).await.unwrap();
    }
    store.save(ph(7.0), None).await.unwrap();

    let snapshot = store.get_latest().await;
    assert_eq!(snapshot.history_len(DeviceClass::Ec), 100);
    assert_eq!(snapshot.history_len(DeviceClass::Ph), 1);

    let values: Vec<f64> = snapshot
        .ec_history
        .iter()
        .map(|r| r.measurements.ec_value)
        .collect();
    let expected: Vec<f64> = (50..150).map(|i| i as f64).collect();
    assert_eq!(values, expected);

    // History is in insertion order and timestamps never go backwards
    assert!(snapshot
        .ec_history
        .windows(2)
        .all(|w| w[0].recorded_at <= w[1].recorded_at));
    assert_eq!(snapshot.ec_latest.unwrap().measurements.ec_value, 149.0);
}

#[rstest]
#[tokio::test]
async fn test_file_store_survives_restart(scratch: TempDir) {
    let config = storage_config(StorageBackend::File, &scratch);

    let first = create_store(&config).await.unwrap();
    first.save(ec(1200.0), None).await.unwrap();
    first.close().await.unwrap();

    let second = create_store(&config).await.unwrap();
    let snapshot = second.get_latest().await;
    assert_eq!(snapshot.ec_latest.unwrap().measurements.ec_value, 1200.0);
}

#[rstest]
#[tokio::test]
async fn test_file_store_reads_existing_document(scratch: TempDir) {
    let path = scratch.path().join("sensor_data.json");
    std::fs::write(
        &path,
        r#"{
            "ph_monitor": {
                "device_id": "ESP32_PH",
                "temp1": 25.5, "hum1": 65, "temp2": 24.8, "hum2": 70, "ph_val": 6.5,
                "timestamp": "2025-01-10T08:00:00.000Z"
            },
            "ec_monitor": null,
            "ph_history": [{
                "device_id": "ESP32_PH",
                "temp1": 25.5, "hum1": 65, "temp2": 24.8, "hum2": 70, "ph_val": 6.5,
                "timestamp": "2025-01-10T08:00:00.000Z"
            }],
            "ec_history": []
        }"#,
    )
    .unwrap();

    let store = FileReadingStore::new(path, 100);
    let saved = store.save(ph(6.8), None).await.unwrap();
    let snapshot = store.get_latest().await;

    assert_eq!(snapshot.history_len(DeviceClass::Ph), 2);
    assert_eq!(snapshot.ph_history[0].measurements.ph_value, 6.5);
    assert_eq!(snapshot.ph_latest.unwrap().recorded_at, saved.recorded_at);
}

#[rstest]
#[tokio::test]
async fn test_saves_after_corruption_recover(scratch: TempDir) {
    let config = storage_config(StorageBackend::File, &scratch);
    std::fs::write(&config.data_file, b"\x00\x01 garbage").unwrap();

    let store = create_store(&config).await.unwrap();
    assert_eq!(store.get_latest().await, StoreSnapshot::default());

    store.save(ec(900.0), None).await.unwrap();
    let snapshot = store.get_latest().await;
    assert_eq!(snapshot.history_len(DeviceClass::Ec), 1);
}

#[cfg(feature = "turso")]
#[rstest]
#[tokio::test]
async fn test_turso_history_keeps_most_recent_hundred(scratch: TempDir) {
    let store = create_store(&storage_config(StorageBackend::Turso, &scratch))
        .await
        .unwrap();

    for i in 0..150 {
        store.save(ph(i as f64 / 20.0), None).await.unwrap();
    }

    let snapshot = store.get_latest().await;
    assert_eq!(snapshot.history_len(DeviceClass::Ph), 100);
    assert_eq!(snapshot.ph_history[0].measurements.ph_value, 50.0 / 20.0);
    assert_eq!(snapshot.ph_latest.unwrap().measurements.ph_value, 149.0 / 20.0);
    store.close().await.unwrap();
}
