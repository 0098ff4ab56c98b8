use serde_json::{Map, Value};
use thiserror::Error;

use super::models::SensorSnapshot;

// ---------------------------------------------------------------------------
// Field aliases
//
// The hardware writes snake_case keys (`soil_moisture`, `water_pump`), older
// firmware and the web client wrote camelCase. Both are accepted; the first
// key present wins.
// ---------------------------------------------------------------------------

const PUMP_KEYS: &[&str] = &["water_pump", "waterPump", "pump_on", "pumpOn", "pump"];
const SOIL_MOISTURE_KEYS: &[&str] = &["soil_moisture", "soilMoisture"];
const TEMPERATURE_KEYS: &[&str] = &["temperature", "temperature_c"];
const HUMIDITY_KEYS: &[&str] = &["humidity", "humidity_pct"];
const PH_LEVEL_KEYS: &[&str] = &["ph_level", "phLevel", "ph"];
const FLOW_RATE_KEYS: &[&str] = &["flow_rate", "flowRate"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("expected a JSON object at the feed path, got {0}")]
    NotAnObject(&'static str),
}

/// Map a raw feed payload into the canonical `SensorSnapshot`.
///
/// | Input                         | Result                        |
/// |-------------------------------|-------------------------------|
/// | pump `1`, `true`, `"on"`      | `pump_on = true`              |
/// | pump `0`, `"off"`, absent     | `pump_on = false`             |
/// | numeric field absent / `null` | `0.0`                         |
/// | numeric field `"21.5"`        | `21.5`                        |
/// | numeric field NaN / garbage   | `0.0`                         |
/// | flow rate absent              | `None`                        |
pub fn normalize(payload: &Value) -> Result<SensorSnapshot, NormalizeError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| NormalizeError::NotAnObject(json_type(payload)))?;

    Ok(SensorSnapshot {
        pump_on: field(obj, PUMP_KEYS).map(pump_state).unwrap_or(false),
        soil_moisture_pct: numeric_or_zero(field(obj, SOIL_MOISTURE_KEYS)),
        temperature_c: numeric_or_zero(field(obj, TEMPERATURE_KEYS)),
        humidity_pct: numeric_or_zero(field(obj, HUMIDITY_KEYS)),
        ph_level: numeric_or_zero(field(obj, PH_LEVEL_KEYS)),
        flow_rate_lpm: field(obj, FLOW_RATE_KEYS).map(|v| numeric(v).unwrap_or(0.0)),
    })
}

/// `true` for an empty feed value: absent, `null`, or an object with no keys.
pub fn is_empty_payload(payload: Option<&Value>) -> bool {
    match payload {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// Pump encodings seen in the wild: `1`/`0`, `true`/`false`, `"on"`/`"off"`.
pub(crate) fn pump_state(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v == 1.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "on" | "1" | "true"),
        _ => false,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    v.is_finite().then_some(v)
}

fn numeric_or_zero(value: Option<&Value>) -> f64 {
    value.and_then(numeric).unwrap_or(0.0)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn pump_on_encodings_normalize_to_true() {
        for v in [json!(1), json!("on"), json!("ON"), json!(true), json!("1")] {
            assert!(pump_state(&v), "{v} should be on");
        }
    }

    #[test]
    fn pump_off_encodings_normalize_to_false() {
        for v in [json!(0), json!("off"), json!(false), json!("banana"), json!(2)] {
            assert!(!pump_state(&v), "{v} should be off");
        }

        let snapshot = normalize(&json!({ "temperature": 20 })).unwrap();
        assert!(!snapshot.pump_on, "absent pump field should be off");
    }

    #[test]
    fn snake_case_payload_maps_to_snapshot() {
        let snapshot = normalize(&json!({
            "water_pump": "on",
            "soil_moisture": 35,
            "temperature": 24.5,
            "humidity": 61,
            "ph_level": 6.8,
            "flow_rate": 1.2
        }))
        .unwrap();

        assert_eq!(
            snapshot,
            SensorSnapshot {
                pump_on: true,
                soil_moisture_pct: 35.0,
                temperature_c: 24.5,
                humidity_pct: 61.0,
                ph_level: 6.8,
                flow_rate_lpm: Some(1.2),
            }
        );
    }

    #[test]
    fn camel_case_payload_maps_to_snapshot() {
        let snapshot = normalize(&json!({
            "waterPump": 1,
            "soilMoisture": 50,
            "temperature": 22,
            "humidity": 40,
            "phLevel": 7
        }))
        .unwrap();

        assert!(snapshot.pump_on);
        assert_eq!(snapshot.soil_moisture_pct, 50.0);
        assert_eq!(snapshot.ph_level, 7.0);
        assert_eq!(snapshot.flow_rate_lpm, None);
    }

    #[test]
    fn missing_and_garbage_numbers_default_to_zero() {
        let snapshot = normalize(&json!({
            "soil_moisture": null,
            "temperature": "warm",
            "humidity": "55.5"
        }))
        .unwrap();

        assert_eq!(snapshot.soil_moisture_pct, 0.0);
        assert_eq!(snapshot.temperature_c, 0.0);
        assert_eq!(snapshot.humidity_pct, 55.5);
        assert_eq!(snapshot.ph_level, 0.0);
        assert!(!snapshot.temperature_c.is_nan());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert_eq!(normalize(&json!(42)), Err(NormalizeError::NotAnObject("a number")));
        assert_eq!(normalize(&json!([1, 2])), Err(NormalizeError::NotAnObject("an array")));
    }

    #[test]
    fn empty_payload_detection() {
        assert!(is_empty_payload(None));
        assert!(is_empty_payload(Some(&Value::Null)));
        assert!(is_empty_payload(Some(&json!({}))));
        assert!(!is_empty_payload(Some(&json!({ "temperature": 0 }))));
        assert!(!is_empty_payload(Some(&json!(3))));
    }
}
