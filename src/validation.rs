//! Submission validation
//!
//! Device firmware posts loosely typed JSON: numbers sometimes arrive as
//! strings and fields may be missing or `null`. Each endpoint gets a typed
//! body struct whose fields are checked for presence first, then parsed as
//! finite numbers, then range-checked. Only a fully validated submission is
//! handed to the store.

use crate::error::{MonitorError, Result};
use crate::models::{EcMeasurements, PhMeasurements};
use serde::Deserialize;
use serde_json::Value;

/// Accepted pH range
pub const PH_RANGE: (f64, f64) = (0.0, 14.0);

/// Accepted conductivity range in µS/cm
pub const EC_RANGE: (f64, f64) = (0.0, 100_000.0);

/// Raw body of a pH monitor submission
#[derive(Debug, Default, Deserialize)]
pub struct PhSubmission {
    #[serde(default)]
    pub device_id: Option<Value>,
    #[serde(default)]
    pub temp1: Option<Value>,
    #[serde(default)]
    pub hum1: Option<Value>,
    #[serde(default)]
    pub temp2: Option<Value>,
    #[serde(default)]
    pub hum2: Option<Value>,
    #[serde(default)]
    pub ph_val: Option<Value>,
}

/// Raw body of an EC monitor submission
#[derive(Debug, Default, Deserialize)]
pub struct EcSubmission {
    #[serde(default)]
    pub device_id: Option<Value>,
    #[serde(default)]
    pub ec_value: Option<Value>,
    #[serde(default)]
    pub voltage: Option<Value>,
    #[serde(default)]
    pub temperature: Option<Value>,
}

impl PhSubmission {
    /// Reporting node id, if one usable as text was sent
    pub fn device_id(&self) -> Option<String> {
        device_id_text(&self.device_id)
    }

    /// Check presence, numeric form and range of every field
    pub fn validate(&self) -> Result<PhMeasurements> {
        let fields = [&self.temp1, &self.hum1, &self.temp2, &self.hum2, &self.ph_val];
        if fields.iter().any(|f| is_missing(f)) {
            return Err(MonitorError::validation(
                "Missing required fields: temp1, hum1, temp2, hum2, ph_val",
            ));
        }

        let parsed: Option<Vec<f64>> = fields.iter().map(|f| parse_number(f)).collect();
        let [temp1, hum1, temp2, hum2, ph_value] = match parsed.as_deref() {
            Some(&[a, b, c, d, e]) => [a, b, c, d, e],
            _ => return Err(MonitorError::validation("All values must be valid numbers")),
        };

        if !in_range(ph_value, PH_RANGE) {
            return Err(MonitorError::validation("ph_val out of range (0-14)"));
        }

        Ok(PhMeasurements {
            temp1,
            hum1,
            temp2,
            hum2,
            ph_value,
        })
    }
}

impl EcSubmission {
    /// Reporting node id, if one usable as text was sent
    pub fn device_id(&self) -> Option<String> {
        device_id_text(&self.device_id)
    }

    /// Check presence, numeric form and range of every field
    pub fn validate(&self) -> Result<EcMeasurements> {
        let fields = [&self.ec_value, &self.voltage, &self.temperature];
        if fields.iter().any(|f| is_missing(f)) {
            return Err(MonitorError::validation(
                "Missing required fields: ec_value, voltage, temperature",
            ));
        }

        let parsed: Option<Vec<f64>> = fields.iter().map(|f| parse_number(f)).collect();
        let [ec_value, voltage, temperature] = match parsed.as_deref() {
            Some(&[a, b, c]) => [a, b, c],
            _ => return Err(MonitorError::validation("All values must be valid numbers")),
        };

        if !in_range(ec_value, EC_RANGE) {
            return Err(MonitorError::validation(
                "ec_value out of range (0-100000 µS/cm)",
            ));
        }

        Ok(EcMeasurements {
            ec_value,
            voltage,
            temperature,
        })
    }
}

/// Decode a request body into a submission struct.
///
/// An empty body counts as `{}` so the caller gets the missing-fields
/// message rather than a parse error.
pub fn parse_body<T>(body: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| MonitorError::validation(format!("Invalid JSON body: {e}")))
}

/// Strings are kept, numbers are rendered as text, anything else is absent
fn device_id_text(value: &Option<Value>) -> Option<String> {
    match value.as_ref()? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_missing(value: &Option<Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Numbers and numeric strings are accepted; the result must be finite
fn parse_number(value: &Option<Value>) -> Option<f64> {
    let n = match value.as_ref()? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn in_range(value: f64, (min, max): (f64, f64)) -> bool {
    (min..=max).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ph_body(value: Value) -> PhSubmission {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let m = ph_body(json!({
            "temp1": "25.5", "hum1": 65, "temp2": 24.8, "hum2": " 70 ", "ph_val": "6.5"
        }))
        .validate()
        .unwrap();
        assert_eq!(m.temp1, 25.5);
        assert_eq!(m.hum2, 70.0);
        assert_eq!(m.ph_value, 6.5);
    }

    #[test]
    fn test_null_counts_as_missing() {
        let err = ph_body(json!({
            "temp1": 25.5, "hum1": null, "temp2": 24.8, "hum2": 70, "ph_val": 6.5
        }))
        .validate()
        .unwrap_err();
        assert!(err.to_string().starts_with("Missing required fields"));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert_eq!(parse_number(&Some(json!("NaN"))), None);
        assert_eq!(parse_number(&Some(json!("inf"))), None);
        assert_eq!(parse_number(&Some(json!(true))), None);
        assert_eq!(parse_number(&Some(json!("1e3"))), Some(1000.0));
    }

    #[test]
    fn test_device_id_of_any_type_is_accepted() {
        let body: EcSubmission = parse_body(
            br#"{"device_id": 2, "ec_value": 1200, "voltage": 1.85, "temperature": 25.0}"#,
        )
        .unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(body.device_id().as_deref(), Some("2"));

        let body: EcSubmission = parse_body(
            br#"{"device_id": {"mac": "aa"}, "ec_value": 1200, "voltage": 1.85, "temperature": 25.0}"#,
        )
        .unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(body.device_id(), None);

        let body = ph_body(json!({
            "device_id": "ESP32_PH", "temp1": 25.5, "hum1": 65, "temp2": 24.8, "hum2": 70, "ph_val": 6.5
        }));
        assert_eq!(body.device_id().as_deref(), Some("ESP32_PH"));
    }

    #[test]
    fn test_empty_body_is_empty_object() {
        let body: EcSubmission = parse_body(b"  ").unwrap();
        assert!(body.ec_value.is_none());
        assert!(parse_body::<EcSubmission>(b"{not json").is_err());
    }
}
