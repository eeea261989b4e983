//! Reading and store-state types
//!
//! The persisted layout mirrors the document the sensor nodes' earlier
//! backend kept on disk, so an existing `sensor_data.json` keeps loading:
//!
//! ```json
//! {
//!   "ph_monitor": { "device_id": "ESP32_PH", "temp1": 25.5, ..., "timestamp": "..." },
//!   "ec_monitor": null,
//!   "ph_history": [ ... ],
//!   "ec_history": [ ... ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of readings kept per device class
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// One of the two fixed sensor roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// pH monitor node (air + water temperature/humidity probes, pH probe)
    Ph,
    /// EC monitor node (conductivity probe)
    Ec,
}

impl DeviceClass {
    /// Device id recorded when a submission does not carry one
    pub fn default_device_id(&self) -> &'static str {
        match self {
            DeviceClass::Ph => "ESP32_PH",
            DeviceClass::Ec => "ESP32_EC",
        }
    }

    /// Stable storage key
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Ph => "ph",
            DeviceClass::Ec => "ec",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Ph => write!(f, "pH"),
            DeviceClass::Ec => write!(f, "EC"),
        }
    }
}

/// Measurements reported by the pH monitor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhMeasurements {
    /// Air temperature (°C)
    pub temp1: f64,
    /// Air humidity (%)
    pub hum1: f64,
    /// Water temperature (°C)
    pub temp2: f64,
    /// Substrate humidity (%)
    pub hum2: f64,
    /// pH value
    #[serde(rename = "ph_val")]
    pub ph_value: f64,
}

/// Measurements reported by the EC monitor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EcMeasurements {
    /// Conductivity in µS/cm
    pub ec_value: f64,
    /// Probe voltage (V)
    pub voltage: f64,
    /// Solution temperature (°C)
    pub temperature: f64,
}

/// Validated measurements for either device class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measurements {
    Ph(PhMeasurements),
    Ec(EcMeasurements),
}

impl Measurements {
    pub fn device_class(&self) -> DeviceClass {
        match self {
            Measurements::Ph(_) => DeviceClass::Ph,
            Measurements::Ec(_) => DeviceClass::Ec,
        }
    }
}

impl From<PhMeasurements> for Measurements {
    fn from(m: PhMeasurements) -> Self {
        Measurements::Ph(m)
    }
}

impl From<EcMeasurements> for Measurements {
    fn from(m: EcMeasurements) -> Self {
        Measurements::Ec(m)
    }
}

/// One timestamped submission from a device class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading<M> {
    /// Reporting node, e.g. `ESP32_EC`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(flatten)]
    pub measurements: M,

    /// Assigned by the store at save time
    #[serde(rename = "timestamp")]
    pub recorded_at: DateTime<Utc>,
}

impl<M> Reading<M> {
    pub fn new(measurements: M, device_id: Option<String>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            device_id,
            measurements,
            recorded_at,
        }
    }

    /// Convert the measurement payload, keeping id and timestamp
    pub fn map<N>(self, f: impl FnOnce(M) -> N) -> Reading<N> {
        Reading {
            device_id: self.device_id,
            measurements: f(self.measurements),
            recorded_at: self.recorded_at,
        }
    }
}

pub type PhReading = Reading<PhMeasurements>;
pub type EcReading = Reading<EcMeasurements>;
pub type StoredReading = Reading<Measurements>;

/// Latest reading plus bounded history for both device classes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(rename = "ph_monitor", default)]
    pub ph_latest: Option<PhReading>,

    #[serde(rename = "ec_monitor", default)]
    pub ec_latest: Option<EcReading>,

    #[serde(default)]
    pub ph_history: Vec<PhReading>,

    #[serde(default)]
    pub ec_history: Vec<EcReading>,
}

impl StoreSnapshot {
    /// Record a new reading for its device class.
    ///
    /// The reading becomes the class's latest, is appended to its history,
    /// and the history is cut back to the `history_limit` most recent
    /// entries. The assigned timestamp never goes backwards relative to the
    /// previous latest reading of the same class.
    pub fn apply(
        &mut self,
        measurements: Measurements,
        device_id: Option<String>,
        now: DateTime<Utc>,
        history_limit: usize,
    ) -> StoredReading {
        match measurements {
            Measurements::Ph(m) => {
                let at = not_before(now, self.ph_latest.as_ref().map(|r| r.recorded_at));
                let reading = Reading::new(m, device_id, at);
                self.ph_latest = Some(reading.clone());
                push_bounded(&mut self.ph_history, reading.clone(), history_limit);
                reading.map(Measurements::Ph)
            }
            Measurements::Ec(m) => {
                let at = not_before(now, self.ec_latest.as_ref().map(|r| r.recorded_at));
                let reading = Reading::new(m, device_id, at);
                self.ec_latest = Some(reading.clone());
                push_bounded(&mut self.ec_history, reading.clone(), history_limit);
                reading.map(Measurements::Ec)
            }
        }
    }

    /// Number of stored history entries for a device class
    pub fn history_len(&self, class: DeviceClass) -> usize {
        match class {
            DeviceClass::Ph => self.ph_history.len(),
            DeviceClass::Ec => self.ec_history.len(),
        }
    }

    pub fn has_data(&self, class: DeviceClass) -> bool {
        match class {
            DeviceClass::Ph => self.ph_latest.is_some(),
            DeviceClass::Ec => self.ec_latest.is_some(),
        }
    }
}

/// `now`, unless an earlier save of the same class is stamped later
pub(crate) fn not_before(now: DateTime<Utc>, previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match previous {
        Some(prev) if prev > now => prev,
        _ => now,
    }
}

/// Append and drop the oldest entries beyond `limit`
pub(crate) fn push_bounded<T>(history: &mut Vec<T>, item: T, limit: usize) {
    history.push(item);
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}
