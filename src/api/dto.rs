use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    dashboard::{DashboardView, FeedStatus},
    feed::DataSource,
    sensors::SensorSnapshot,
};

/// The live tiles: latest snapshot plus connection state.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CurrentReadingDto {
    pub source: DataSource,
    pub status: FeedStatus,
    pub snapshot: Option<SensorSnapshot>,
    pub last_update: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl From<DashboardView> for CurrentReadingDto {
    fn from(v: DashboardView) -> Self {
        Self {
            source: v.source,
            status: v.status,
            snapshot: v.snapshot,
            last_update: v.last_update,
            error: v.error,
            notice: v.notice,
        }
    }
}

/// Body of `PUT /thresholds/{sensor_kind}`. Omitted bounds are cleared.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ThresholdUpdateRequest {
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DataSourceRequest {
    pub use_generator: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ForecastParams {
    /// City name; the configured default when omitted
    pub city: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CitySearchParams {
    /// At least three characters, otherwise nothing matches
    #[serde(default)]
    pub q: String,
}
