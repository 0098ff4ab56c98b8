pub mod models;
pub mod synthetic;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

pub use models::{CitySearchResult, ForecastDay, WeatherReport};
pub use synthetic::SyntheticWeather;

use models::ForecastResponse;

pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.weatherapi.com/v1";
const FORECAST_DAYS: &str = "3";
const MIN_SEARCH_LEN: usize = 3;
const PLACEHOLDER_KEY: &str = "YOUR_API_KEY_HERE";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Please add your WeatherAPI.com API key.")]
    MissingApiKey,

    #[error("Failed to fetch weather data: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to fetch weather data: provider returned status {0}")]
    Status(u16),

    #[error("Failed to decode weather data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid weather API URL: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn forecast(&self, city: &str) -> Result<WeatherReport, WeatherError>;

    /// Cities matching `query`. Queries shorter than three characters match
    /// nothing.
    async fn search_cities(&self, query: &str) -> Result<Vec<CitySearchResult>, WeatherError>;
}

/// WeatherAPI.com client.
#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl WeatherApiClient {
    /// An empty or placeholder key counts as missing.
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty() && k != PLACEHOLDER_KEY);
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        let key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;
        let raw = format!("{}/{endpoint}", self.base_url);
        let url = Url::parse_with_params(&raw, [("key", key)].iter().chain(params))
            .map_err(|e| WeatherError::InvalidUrl(format!("{raw}: {e}")))?;
        debug!(endpoint, "Calling weather provider");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice::<T>(&bytes)?)
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiClient {
    async fn forecast(&self, city: &str) -> Result<WeatherReport, WeatherError> {
        let resp: ForecastResponse = self
            .get("forecast.json", &[("q", city), ("days", FORECAST_DAYS)])
            .await?;
        Ok(resp.into())
    }

    async fn search_cities(&self, query: &str) -> Result<Vec<CitySearchResult>, WeatherError> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }
        self.get("search.json", &[("q", query)]).await
    }
}

impl From<ForecastResponse> for WeatherReport {
    fn from(r: ForecastResponse) -> Self {
        Self {
            city: format!("{}, {}", r.location.name, r.location.region),
            current_temp_c: r.current.temp_c,
            humidity_pct: r.current.humidity,
            condition: r.current.condition.text,
            forecast: r
                .forecast
                .forecastday
                .into_iter()
                .map(|d| ForecastDay {
                    weekday: weekday_of(&d.date),
                    date: d.date,
                    avg_temp_c: d.day.avgtemp_c,
                    condition: d.day.condition.text,
                })
                .collect(),
        }
    }
}

/// Short weekday for a `YYYY-MM-DD` date; the input itself if it does not
/// parse.
fn weekday_of(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%a").to_string())
        .unwrap_or_else(|_| date.to_owned())
}
