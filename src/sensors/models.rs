use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// SensorSnapshot
// ---------------------------------------------------------------------------

/// One complete reading of every sensor at a point in time.
///
/// A new snapshot always replaces the previous one wholesale; there is no
/// partial merge. Every numeric field carries a defined value (missing inputs
/// normalize to `0.0`), except `flow_rate_lpm`, which stays `None` when the
/// source does not report it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct SensorSnapshot {
    pub pump_on: bool,
    /// Volumetric soil moisture, 0–100 %.
    pub soil_moisture_pct: f64,
    /// Degrees Celsius
    pub temperature_c: f64,
    /// Relative humidity, 0–100 %.
    pub humidity_pct: f64,
    pub ph_level: f64,
    /// Litres per minute; only reported by some sources.
    pub flow_rate_lpm: Option<f64>,
}

impl SensorSnapshot {
    /// Resolve the field a threshold rule of `kind` is checked against.
    ///
    /// Returns `None` for kinds the snapshot has no field for and for the
    /// optional flow rate when it was not reported.
    pub fn value_of(&self, kind: &SensorKind) -> Option<f64> {
        match kind {
            SensorKind::SoilMoisture => Some(self.soil_moisture_pct),
            SensorKind::Temperature => Some(self.temperature_c),
            SensorKind::Humidity => Some(self.humidity_pct),
            SensorKind::PhLevel => Some(self.ph_level),
            SensorKind::FlowRate => self.flow_rate_lpm,
            SensorKind::Other(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SensorKind
// ---------------------------------------------------------------------------

/// The sensor a threshold rule applies to.
///
/// Stored as a string in persistence and on the wire. Both camelCase
/// (`soilMoisture`) and snake_case (`soil_moisture`) spellings parse; any
/// other string is kept verbatim as `Other` so rules written by newer clients
/// still load. `Other` rules never produce alerts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensorKind {
    SoilMoisture,
    Temperature,
    Humidity,
    PhLevel,
    FlowRate,
    Other(String),
}

impl SensorKind {
    /// Human-readable label used in alert titles and messages.
    pub fn label(&self) -> &str {
        match self {
            SensorKind::SoilMoisture => "Soil Moisture",
            SensorKind::Temperature => "Temperature",
            SensorKind::Humidity => "Humidity",
            SensorKind::PhLevel => "pH Level",
            SensorKind::FlowRate => "Flow Rate",
            SensorKind::Other(s) => s.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SensorKind::Other(_))
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SensorKind::SoilMoisture => "soilMoisture",
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::PhLevel => "phLevel",
            SensorKind::FlowRate => "flowRate",
            SensorKind::Other(s) => s.as_str(),
        };
        f.write_str(s)
    }
}

impl FromStr for SensorKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "soilMoisture" | "soil_moisture" => Self::SoilMoisture,
            "temperature" => Self::Temperature,
            "humidity" => Self::Humidity,
            "phLevel" | "ph_level" => Self::PhLevel,
            "flowRate" | "flow_rate" => Self::FlowRate,
            other => Self::Other(other.to_owned()),
        })
    }
}

impl From<String> for SensorKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<SensorKind> for String {
    fn from(kind: SensorKind) -> Self {
        kind.to_string()
    }
}

// ---------------------------------------------------------------------------
// ReadingHistoryEntry
// ---------------------------------------------------------------------------

/// A past snapshot as shown on the trend chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReadingHistoryEntry {
    pub captured_at: DateTime<Utc>,
    pub soil_moisture_pct: f64,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub ph_level: f64,
}

impl ReadingHistoryEntry {
    pub fn from_snapshot(snapshot: &SensorSnapshot, captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            soil_moisture_pct: snapshot.soil_moisture_pct,
            temperature_c: snapshot.temperature_c,
            humidity_pct: snapshot.humidity_pct,
            ph_level: snapshot.ph_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_kind_parses_both_casings() {
        assert_eq!("soilMoisture".parse::<SensorKind>().unwrap(), SensorKind::SoilMoisture);
        assert_eq!("soil_moisture".parse::<SensorKind>().unwrap(), SensorKind::SoilMoisture);
        assert_eq!("ph_level".parse::<SensorKind>().unwrap(), SensorKind::PhLevel);
        assert_eq!("flowRate".parse::<SensorKind>().unwrap(), SensorKind::FlowRate);
    }

    #[test]
    fn unknown_sensor_kind_is_preserved() {
        let kind: SensorKind = "leafWetness".parse().unwrap();
        assert_eq!(kind, SensorKind::Other("leafWetness".to_owned()));
        assert!(!kind.is_known());
        assert_eq!(kind.to_string(), "leafWetness");
    }

    #[test]
    fn sensor_kind_serializes_as_camel_case_string() {
        let json = serde_json::to_value(SensorKind::SoilMoisture).unwrap();
        assert_eq!(json, serde_json::json!("soilMoisture"));

        let back: SensorKind = serde_json::from_value(serde_json::json!("humidity")).unwrap();
        assert_eq!(back, SensorKind::Humidity);
    }

    #[test]
    fn value_of_skips_missing_flow_rate_and_unknown_kinds() {
        let snapshot = SensorSnapshot {
            soil_moisture_pct: 42.0,
            ..Default::default()
        };
        assert_eq!(snapshot.value_of(&SensorKind::SoilMoisture), Some(42.0));
        assert_eq!(snapshot.value_of(&SensorKind::FlowRate), None);
        assert_eq!(snapshot.value_of(&SensorKind::Other("x".into())), None);
    }
}
