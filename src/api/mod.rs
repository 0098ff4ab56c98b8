pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    dashboard::DashboardHandle,
    weather::{SyntheticWeather, WeatherProvider},
};

#[derive(Clone)]
pub struct AppState {
    pub dashboard: DashboardHandle,
    pub weather: Arc<dyn WeatherProvider>,
    pub synthetic_weather: SyntheticWeather,
    pub default_city: String,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/source", put(handlers::set_data_source))
        .route("/sensors/current", get(handlers::get_current_reading))
        .route("/sensors/history", get(handlers::get_history))
        .route("/alerts", get(handlers::get_alerts))
        .route("/alerts/{id}", delete(handlers::dismiss_alert))
        .route("/thresholds", get(handlers::get_thresholds))
        .route("/thresholds/{sensor_kind}", put(handlers::upsert_threshold))
        .route("/weather/forecast", get(handlers::get_forecast))
        .route("/weather/search", get(handlers::search_cities))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
