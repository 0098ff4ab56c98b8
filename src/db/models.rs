use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::{sensors::ReadingHistoryEntry, thresholds::ThresholdRule};

/// The columns the trend history needs.
#[derive(Debug, Clone, FromRow)]
pub struct SensorReadingRow {
    pub captured_at: DateTime<Utc>,
    /// Percent
    pub soil_moisture_pct: f64,
    /// Degrees Celsius
    pub temperature_c: f64,
    /// Relative humidity percentage
    pub humidity_pct: f64,
    pub ph_level: f64,
}

impl From<SensorReadingRow> for ReadingHistoryEntry {
    fn from(r: SensorReadingRow) -> Self {
        Self {
            captured_at: r.captured_at,
            soil_moisture_pct: r.soil_moisture_pct,
            temperature_c: r.temperature_c,
            humidity_pct: r.humidity_pct,
            ph_level: r.ph_level,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ThresholdRow {
    pub id: String,
    pub sensor_kind: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub enabled: bool,
}

impl From<ThresholdRow> for ThresholdRule {
    fn from(r: ThresholdRow) -> Self {
        Self {
            id: r.id,
            sensor_kind: r.sensor_kind.into(),
            min_value: r.min_value,
            max_value: r.max_value,
            enabled: r.enabled,
        }
    }
}
