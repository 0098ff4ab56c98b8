use anyhow::{Context, Result};

use crate::{history::DEFAULT_HISTORY_LIMIT, weather::DEFAULT_WEATHER_BASE_URL};

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL; readings and thresholds stay in memory when unset
    pub database_url: Option<String>,
    /// Firebase Realtime Database base URL; the live source is unavailable when unset
    pub feed_database_url: Option<String>,
    /// Database path streamed by the live source
    pub feed_path: String,
    pub feed_auth_token: Option<String>,
    /// Start on the synthetic generator instead of the live feed
    pub start_with_generator: bool,
    /// Synthetic generator period in seconds
    pub generator_interval_secs: u64,
    /// Readings kept for the trend chart and loaded at startup
    pub history_limit: usize,
    /// Scope threshold rules are stored under
    pub threshold_scope: String,
    pub weather_api_key: Option<String>,
    pub weather_base_url: String,
    /// City shown when no city is requested
    pub default_city: String,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let maybe = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: maybe("DATABASE_URL"),
            feed_database_url: maybe("FEED_DATABASE_URL"),
            feed_path: optional("FEED_PATH", "sensors"),
            feed_auth_token: maybe("FEED_AUTH_TOKEN"),
            start_with_generator: parse_bool(&optional("START_WITH_GENERATOR", "false"))
                .context("START_WITH_GENERATOR must be true or false")?,
            generator_interval_secs: optional("GENERATOR_INTERVAL_SECS", "3")
                .parse::<u64>()
                .context("GENERATOR_INTERVAL_SECS must be a positive integer")
                .and_then(positive)?,
            history_limit: optional("HISTORY_LIMIT", &DEFAULT_HISTORY_LIMIT.to_string())
                .parse::<usize>()
                .context("HISTORY_LIMIT must be a positive integer")
                .and_then(positive)?,
            threshold_scope: optional("THRESHOLD_SCOPE", "public"),
            weather_api_key: maybe("WEATHER_API_KEY"),
            weather_base_url: optional("WEATHER_BASE_URL", DEFAULT_WEATHER_BASE_URL),
            default_city: optional("DEFAULT_CITY", "New Delhi"),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid boolean: {other:?}"),
    }
}

fn positive<T: PartialEq + Default>(value: T) -> Result<T> {
    if value == T::default() {
        anyhow::bail!("value must be greater than zero");
    }
    Ok(value)
}
