use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use utoipa::OpenApi;

use super::{
    dto::{
        CitySearchParams, CurrentReadingDto, DataSourceRequest, ForecastParams,
        ThresholdUpdateRequest,
    },
    errors::AppError,
    AppState,
};
use crate::{
    alerts::{Alert, Severity},
    dashboard::{DashboardView, FeedStatus},
    feed::DataSource,
    sensors::{ReadingHistoryEntry, SensorKind, SensorSnapshot},
    thresholds::ThresholdRule,
    weather::{CitySearchResult, ForecastDay, WeatherReport},
};

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// The full view model: snapshot, alerts, history, thresholds and status.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Current dashboard state", body = DashboardView),
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardView> {
    Json(state.dashboard.view())
}

/// Latest snapshot and connection state, for the live tiles.
#[utoipa::path(
    get,
    path = "/sensors/current",
    responses(
        (status = 200, description = "Latest snapshot; `snapshot` is null until the first reading", body = CurrentReadingDto),
    ),
    tag = "sensors"
)]
pub async fn get_current_reading(State(state): State<AppState>) -> Json<CurrentReadingDto> {
    Json(state.dashboard.view().into())
}

/// Recent readings for the trend chart, oldest first.
#[utoipa::path(
    get,
    path = "/sensors/history",
    responses(
        (status = 200, description = "Reading history", body = Vec<ReadingHistoryEntry>),
    ),
    tag = "sensors"
)]
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<ReadingHistoryEntry>> {
    Json(state.dashboard.view().history)
}

/// Switch between the live feed and the synthetic generator.
///
/// Returns once the previous source has stopped.
#[utoipa::path(
    put,
    path = "/source",
    request_body = DataSourceRequest,
    responses(
        (status = 200, description = "Dashboard state after the switch", body = DashboardView),
        (status = 500, description = "Dashboard service stopped"),
    ),
    tag = "dashboard"
)]
pub async fn set_data_source(
    State(state): State<AppState>,
    Json(body): Json<DataSourceRequest>,
) -> Result<Json<DashboardView>, AppError> {
    let source = DataSource::from_use_generator(body.use_generator);
    Ok(Json(state.dashboard.set_data_source(source).await?))
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/alerts",
    responses(
        (status = 200, description = "Active alerts", body = Vec<Alert>),
    ),
    tag = "alerts"
)]
pub async fn get_alerts(State(state): State<AppState>) -> Json<Vec<Alert>> {
    Json(state.dashboard.view().alerts)
}

/// Dismiss one alert. Unknown ids are accepted. A dismissed alert comes
/// back on the next reading if its condition still holds.
#[utoipa::path(
    delete,
    path = "/alerts/{id}",
    params(
        ("id" = String, Path, description = "Alert id, e.g. `<rule id>-low`"),
    ),
    responses(
        (status = 204, description = "Alert dismissed"),
        (status = 500, description = "Dashboard service stopped"),
    ),
    tag = "alerts"
)]
pub async fn dismiss_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.dashboard.dismiss_alert(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/thresholds",
    responses(
        (status = 200, description = "Threshold rules in configured order", body = Vec<ThresholdRule>),
    ),
    tag = "thresholds"
)]
pub async fn get_thresholds(State(state): State<AppState>) -> Json<Vec<ThresholdRule>> {
    Json(state.dashboard.view().thresholds)
}

/// Set the bounds for one sensor kind. Applies from the next reading on.
#[utoipa::path(
    put,
    path = "/thresholds/{sensor_kind}",
    params(
        ("sensor_kind" = String, Path, description = "soilMoisture, temperature, humidity, phLevel or flowRate"),
    ),
    request_body = ThresholdUpdateRequest,
    responses(
        (status = 200, description = "Existing rule updated", body = ThresholdRule),
        (status = 201, description = "Rule created", body = ThresholdRule),
        (status = 400, description = "Unknown sensor kind or invalid bounds"),
        (status = 500, description = "Dashboard service stopped"),
    ),
    tag = "thresholds"
)]
pub async fn upsert_threshold(
    State(state): State<AppState>,
    Path(sensor_kind): Path<String>,
    Json(body): Json<ThresholdUpdateRequest>,
) -> Result<(StatusCode, Json<ThresholdRule>), AppError> {
    let kind: SensorKind = sensor_kind.into();
    if !kind.is_known() {
        return Err(AppError::BadRequest(format!("unknown sensor kind: {kind}")));
    }
    validate_bounds(body.min_value, body.max_value)?;

    let (rule, created) = state
        .dashboard
        .upsert_threshold(kind, body.min_value, body.max_value)
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(rule)))
}

fn validate_bounds(min: Option<f64>, max: Option<f64>) -> Result<(), AppError> {
    if min.iter().chain(max.iter()).any(|v| !v.is_finite()) {
        return Err(AppError::BadRequest("bounds must be finite numbers".into()));
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(AppError::BadRequest(format!(
                "min_value {min} is greater than max_value {max}"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Weather
// ---------------------------------------------------------------------------

/// Current weather and a three-day forecast. Synthetic while the dashboard
/// runs on the generator.
#[utoipa::path(
    get,
    path = "/weather/forecast",
    params(ForecastParams),
    responses(
        (status = 200, description = "Weather report", body = WeatherReport),
        (status = 502, description = "Weather provider failed"),
        (status = 503, description = "Weather API key not configured"),
    ),
    tag = "weather"
)]
pub async fn get_forecast(
    State(state): State<AppState>,
    Query(params): Query<ForecastParams>,
) -> Result<Json<WeatherReport>, AppError> {
    let city = params
        .city
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| state.default_city.clone());

    if state.dashboard.view().source == DataSource::Generator {
        let today = Utc::now().date_naive();
        let report = state
            .synthetic_weather
            .report(&mut rand::thread_rng(), &city, today);
        return Ok(Json(report));
    }

    Ok(Json(state.weather.forecast(&city).await?))
}

#[utoipa::path(
    get,
    path = "/weather/search",
    params(CitySearchParams),
    responses(
        (status = 200, description = "Matching cities", body = Vec<CitySearchResult>),
        (status = 502, description = "Weather provider failed"),
        (status = 503, description = "Weather API key not configured"),
    ),
    tag = "weather"
)]
pub async fn search_cities(
    State(state): State<AppState>,
    Query(params): Query<CitySearchParams>,
) -> Result<Json<Vec<CitySearchResult>>, AppError> {
    Ok(Json(state.weather.search_cities(&params.q).await?))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        get_dashboard,
        get_current_reading,
        get_history,
        set_data_source,
        get_alerts,
        dismiss_alert,
        get_thresholds,
        upsert_threshold,
        get_forecast,
        search_cities,
        health,
    ),
    components(schemas(
        DashboardView,
        FeedStatus,
        DataSource,
        SensorSnapshot,
        ReadingHistoryEntry,
        Alert,
        Severity,
        ThresholdRule,
        CurrentReadingDto,
        ThresholdUpdateRequest,
        DataSourceRequest,
        WeatherReport,
        ForecastDay,
        CitySearchResult,
    )),
    tags(
        (name = "dashboard",  description = "Dashboard state and data source"),
        (name = "sensors",    description = "Sensor readings"),
        (name = "alerts",     description = "Threshold alerts"),
        (name = "thresholds", description = "Alert threshold configuration"),
        (name = "weather",    description = "Weather forecast and city search"),
        (name = "system",     description = "System endpoints"),
    ),
    info(
        title = "Irrigation Dashboard API",
        version = "0.1.0",
        description = "Live irrigation telemetry, threshold alerts and weather"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum_test::TestServer;
    use reqwest::Client;
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        api::{router, AppState},
        dashboard::{DashboardService, DashboardSettings, FeedSources},
        db::MemoryStore,
        feed::SyntheticGenerator,
        weather::{SyntheticWeather, WeatherApiClient},
    };

    fn test_server(initial_source: DataSource) -> TestServer {
        let dashboard = DashboardService::spawn(
            DashboardSettings {
                initial_source,
                history_limit: 24,
                threshold_scope: "public".into(),
                feed_path: "sensors".into(),
            },
            FeedSources {
                live: None,
                generator: Arc::new(SyntheticGenerator::new(Duration::from_secs(3)).with_seed(5)),
            },
            Arc::new(MemoryStore::new()),
        );
        let state = AppState {
            dashboard,
            weather: Arc::new(WeatherApiClient::new(
                Client::new(),
                "http://127.0.0.1:9",
                None,
            )),
            synthetic_weather: SyntheticWeather::new(),
            default_city: "New Delhi".into(),
        };
        TestServer::new(router(state)).unwrap()
    }

    // -----------------------------------------------------------------------
    // System
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_returns_ok() {
        let server = test_server(DataSource::Generator);
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        assert_eq!(resp.json::<Value>(), json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let server = test_server(DataSource::Generator);
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Irrigation Dashboard API");
        assert!(body["paths"]["/thresholds/{sensor_kind}"].is_object());
    }

    // -----------------------------------------------------------------------
    // Dashboard
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn dashboard_reports_source_and_status() {
        let server = test_server(DataSource::Generator);
        let resp = server.get("/dashboard").await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["source"], "generator");
        assert!(body["alerts"].is_array());
        assert!(body["history"].is_array());
    }

    #[tokio::test]
    async fn switching_to_unconfigured_live_feed_shows_error() {
        let server = test_server(DataSource::Generator);
        let resp = server
            .put("/source")
            .json(&json!({ "use_generator": false }))
            .await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["source"], "live");
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("not configured"));

        let current: Value = server.get("/sensors/current").await.json();
        assert_eq!(current["status"], "error");
    }

    // -----------------------------------------------------------------------
    // Thresholds and alerts
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn threshold_upsert_creates_then_updates() {
        let server = test_server(DataSource::Generator);

        let resp = server
            .put("/thresholds/soilMoisture")
            .json(&json!({ "min_value": 30.0, "max_value": 70.0 }))
            .await;
        resp.assert_status(StatusCode::CREATED);
        let created: Value = resp.json();
        assert_eq!(created["sensor_kind"], "soilMoisture");
        assert_eq!(created["enabled"], true);

        let resp = server
            .put("/thresholds/soil_moisture")
            .json(&json!({ "min_value": 25.0 }))
            .await;
        resp.assert_status_ok();
        let updated: Value = resp.json();
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["min_value"], 25.0);
        assert!(updated["max_value"].is_null());

        let all: Vec<Value> = server.get("/thresholds").await.json();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn threshold_upsert_rejects_unknown_kind_and_inverted_bounds() {
        let server = test_server(DataSource::Generator);

        server
            .put("/thresholds/rainfall")
            .json(&json!({ "min_value": 1.0 }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let resp = server
            .put("/thresholds/temperature")
            .json(&json!({ "min_value": 40.0, "max_value": 10.0 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(resp.json::<Value>()["error"].as_str().unwrap().contains("greater"));

        let all: Vec<Value> = server.get("/thresholds").await.json();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn dismiss_alert_is_idempotent() {
        let server = test_server(DataSource::Generator);

        server
            .delete("/alerts/not-there-low")
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete("/alerts/not-there-low")
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server.get("/alerts").await.assert_status_ok();
    }

    // -----------------------------------------------------------------------
    // Weather
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn forecast_without_api_key_is_service_unavailable() {
        let server = test_server(DataSource::Live);
        let resp = server.get("/weather/forecast").await;

        resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            resp.json::<Value>()["error"],
            "Please add your WeatherAPI.com API key."
        );
    }

    #[tokio::test]
    async fn forecast_is_synthetic_on_generator() {
        let server = test_server(DataSource::Generator);
        let resp = server.get("/weather/forecast").add_query_param("city", "Pune").await;

        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["city"], "Pune");
        assert_eq!(body["forecast"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn short_city_search_returns_empty_list() {
        let server = test_server(DataSource::Live);
        let resp = server.get("/weather/search").add_query_param("q", "De").await;

        resp.assert_status_ok();
        assert_eq!(resp.json::<Value>(), json!([]));
    }

    #[test]
    fn bounds_validation() {
        assert!(validate_bounds(Some(5.0), Some(5.0)).is_ok());
        assert!(validate_bounds(None, None).is_ok());
        assert!(validate_bounds(Some(f64::NAN), None).is_err());
        assert!(validate_bounds(Some(6.0), Some(5.0)).is_err());
    }
}
