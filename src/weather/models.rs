use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Current conditions plus a short forecast for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherReport {
    /// `"{name}, {region}"`
    pub city: String,
    /// Degrees Celsius
    pub current_temp_c: f64,
    /// Relative humidity percentage
    pub humidity_pct: f64,
    pub condition: String,
    pub forecast: Vec<ForecastDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ForecastDay {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Short weekday name, e.g. `"Mon"`.
    pub weekday: String,
    /// Degrees Celsius
    pub avg_temp_c: f64,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CitySearchResult {
    pub id: i64,
    pub name: String,
    pub region: String,
    pub country: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// WeatherAPI.com wire types (only the consumed fields)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastResponse {
    pub location: Location,
    pub current: Current,
    pub forecast: Forecast,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Location {
    pub name: String,
    pub region: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Current {
    pub temp_c: f64,
    pub humidity: f64,
    pub condition: Condition,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Condition {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Forecast {
    pub forecastday: Vec<ForecastDayRaw>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastDayRaw {
    pub date: String,
    pub day: DaySummary,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DaySummary {
    pub avgtemp_c: f64,
    pub condition: Condition,
}
