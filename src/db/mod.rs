pub mod memory;
pub mod models;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::{
    sensors::{ReadingHistoryEntry, SensorSnapshot},
    thresholds::ThresholdRule,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Durable storage for readings and threshold rules.
///
/// The dashboard never waits on it: writes are queued to one worker and
/// failures are only logged.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn save_reading(&self, snapshot: &SensorSnapshot, captured_at: DateTime<Utc>)
        -> Result<()>;

    /// Up to `limit` of the most recent readings. Order is unspecified.
    async fn latest_readings(&self, limit: usize) -> Result<Vec<ReadingHistoryEntry>>;

    /// Rules saved under `scope`, in the order they were first saved.
    async fn thresholds(&self, scope: &str) -> Result<Vec<ThresholdRule>>;

    /// Insert or update by `rule.id`.
    async fn save_threshold(&self, scope: &str, rule: &ThresholdRule) -> Result<()>;
}
