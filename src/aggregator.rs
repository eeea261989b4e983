//! Dashboard payload assembly
//!
//! Turns the latest pH and EC readings (either may be absent) into the
//! `plant_monitoring` / `water_quality` / `device_status` view polled by the
//! dashboard. Composition is pure: the caller supplies "now" for the one
//! field that falls back to the current time.

use crate::models::{EcReading, PhReading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// TDS ≈ EC × factor (ppm from µS/cm)
pub const DEFAULT_TDS_FACTOR: f64 = 0.5;

/// No light sensor is fitted; the dashboard still expects a value
pub const DEFAULT_LIGHT_INTENSITY: f64 = 500.0;

/// No level sensor is fitted; the dashboard still expects a value
pub const DEFAULT_WATER_LEVEL: f64 = 75.0;

/// Derived-value constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Linear EC (µS/cm) to TDS (ppm) conversion factor
    pub tds_factor: f64,
    /// Placeholder reported as `light_intensity`
    pub light_intensity: f64,
    /// Placeholder reported as `water_level`
    pub water_level: f64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            tds_factor: DEFAULT_TDS_FACTOR,
            light_intensity: DEFAULT_LIGHT_INTENSITY,
            water_level: DEFAULT_WATER_LEVEL,
        }
    }
}

/// Plant-side view, present only when a pH reading exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantMonitoring {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub light_intensity: f64,
    pub timestamp: DateTime<Utc>,
}

/// Water-side view, always present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterQuality {
    pub ph_value: f64,
    pub tds_value: i64,
    /// Conductivity in mS/cm, two decimals
    #[serde(rename = "ec_value")]
    pub ec_value_ms_per_cm: f64,
    pub water_temp: f64,
    pub water_level: f64,
    pub voltage: f64,
    pub timestamp: DateTime<Utc>,
}

/// Connection state as shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Connected,
    Disconnected,
}

impl From<bool> for LinkState {
    fn from(connected: bool) -> Self {
        if connected {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub ph_connected: bool,
    pub ec_connected: bool,
    pub ph_monitor: LinkState,
    pub ec_monitor: LinkState,
    pub ph_last_update: Option<DateTime<Utc>>,
    pub ec_last_update: Option<DateTime<Utc>>,
}

/// Everything the dashboard needs from one poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardPayload {
    pub plant_monitoring: Vec<PlantMonitoring>,
    pub water_quality: Vec<WaterQuality>,
    pub device_status: DeviceStatus,
}

/// Build the dashboard view from the latest readings
pub fn compose(
    ph: Option<&PhReading>,
    ec: Option<&EcReading>,
    settings: &DashboardSettings,
    now: DateTime<Utc>,
) -> DashboardPayload {
    let plant_monitoring = ph
        .map(|r| PlantMonitoring {
            temperature: r.measurements.temp1,
            humidity: r.measurements.hum1,
            soil_moisture: r.measurements.hum2,
            light_intensity: settings.light_intensity,
            timestamp: r.recorded_at,
        })
        .into_iter()
        .collect();

    let water_temp = match (ph, ec) {
        (Some(p), _) => p.measurements.temp2,
        (None, Some(e)) => e.measurements.temperature,
        (None, None) => 0.0,
    };

    let water_quality = WaterQuality {
        ph_value: ph.map_or(0.0, |r| r.measurements.ph_value),
        tds_value: ec.map_or(0, |r| tds_ppm(r.measurements.ec_value, settings.tds_factor)),
        ec_value_ms_per_cm: ec.map_or(0.0, |r| micro_to_milli_siemens(r.measurements.ec_value)),
        water_temp,
        water_level: settings.water_level,
        voltage: ec.map_or(0.0, |r| r.measurements.voltage),
        timestamp: ec
            .map(|r| r.recorded_at)
            .or_else(|| ph.map(|r| r.recorded_at))
            .unwrap_or(now),
    };

    DashboardPayload {
        plant_monitoring,
        water_quality: vec![water_quality],
        device_status: DeviceStatus {
            ph_connected: ph.is_some(),
            ec_connected: ec.is_some(),
            ph_monitor: ph.is_some().into(),
            ec_monitor: ec.is_some().into(),
            ph_last_update: ph.map(|r| r.recorded_at),
            ec_last_update: ec.map(|r| r.recorded_at),
        },
    }
}

/// µS/cm to mS/cm, rounded to two decimals
pub fn micro_to_milli_siemens(ec_us_per_cm: f64) -> f64 {
    (ec_us_per_cm / 1000.0 * 100.0).round() / 100.0
}

/// Linear TDS approximation, rounded to whole ppm
pub fn tds_ppm(ec_us_per_cm: f64, factor: f64) -> i64 {
    (ec_us_per_cm * factor).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversion_rounding() {
        assert_eq!(micro_to_milli_siemens(1200.0), 1.2);
        assert_eq!(micro_to_milli_siemens(1234.0), 1.23);
        assert_eq!(micro_to_milli_siemens(1236.0), 1.24);
        assert_eq!(micro_to_milli_siemens(0.0), 0.0);
    }

    #[test]
    fn test_tds_factor_is_applied() {
        assert_eq!(tds_ppm(1200.0, 0.5), 600);
        assert_eq!(tds_ppm(1200.0, 0.64), 768);
        assert_eq!(tds_ppm(1001.0, 0.5), 501);
    }

    #[test]
    fn test_link_state_wire_form() {
        assert_eq!(
            serde_json::to_value(LinkState::from(true)).unwrap(),
            serde_json::json!("connected")
        );
        assert_eq!(
            serde_json::to_value(LinkState::from(false)).unwrap(),
            serde_json::json!("disconnected")
        );
    }
}
