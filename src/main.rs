use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use irrigation_dashboard::{
    api::{self, AppState},
    config::Config,
    dashboard::{DashboardService, DashboardSettings, FeedSources},
    db::{self, MemoryStore, PgStore, ReadingStore},
    feed::{DataSource, FeedSource, FirebaseFeed, SyntheticGenerator},
    weather::{SyntheticWeather, WeatherApiClient},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; env vars may also be set externally
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    // Persistence: Postgres when configured, otherwise process memory
    let store: Arc<dyn ReadingStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool).await?;
            info!("Database ready");
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; readings and thresholds are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let http = Client::new();

    let live = match &config.feed_database_url {
        Some(url) => {
            let feed: Arc<dyn FeedSource> = Arc::new(
                FirebaseFeed::new(
                    http.clone(),
                    url,
                    &config.feed_path,
                    config.feed_auth_token.as_deref(),
                )
                .context("FEED_DATABASE_URL must be a valid URL")?,
            );
            Some(feed)
        }
        None => {
            warn!("FEED_DATABASE_URL not set; only the synthetic generator is available");
            None
        }
    };
    let generator = Arc::new(SyntheticGenerator::new(Duration::from_secs(
        config.generator_interval_secs,
    )));

    let dashboard = DashboardService::spawn(
        DashboardSettings {
            initial_source: DataSource::from_use_generator(config.start_with_generator),
            history_limit: config.history_limit,
            threshold_scope: config.threshold_scope.clone(),
            feed_path: config.feed_path.clone(),
        },
        FeedSources { live, generator },
        store,
    );

    let weather = WeatherApiClient::new(
        http,
        config.weather_base_url.clone(),
        config.weather_api_key.clone(),
    );
    if !weather.has_api_key() {
        warn!("WEATHER_API_KEY not set; live weather lookups will fail");
    }

    let state = AppState {
        dashboard: dashboard.clone(),
        weather: Arc::new(weather),
        synthetic_weather: SyntheticWeather::new(),
        default_city: config.default_city.clone(),
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the active feed before exiting
    dashboard.shutdown().await?;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
