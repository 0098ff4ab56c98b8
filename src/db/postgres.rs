use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{
    models::{SensorReadingRow, ThresholdRow},
    ReadingStore,
};
use crate::{
    sensors::{ReadingHistoryEntry, SensorSnapshot},
    thresholds::ThresholdRule,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn save_reading(
        &self,
        snapshot: &SensorSnapshot,
        captured_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sensor_readings
                (id, captured_at, pump_on, soil_moisture_pct, temperature_c,
                 humidity_pct, ph_level, flow_rate_lpm)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(captured_at)
        .bind(snapshot.pump_on)
        .bind(snapshot.soil_moisture_pct)
        .bind(snapshot.temperature_c)
        .bind(snapshot.humidity_pct)
        .bind(snapshot.ph_level)
        .bind(snapshot.flow_rate_lpm)
        .execute(&self.pool)
        .await
        .context("Failed to insert sensor reading")?;

        debug!(captured_at = %captured_at, "Reading persisted");
        Ok(())
    }

    async fn latest_readings(&self, limit: usize) -> Result<Vec<ReadingHistoryEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, SensorReadingRow>(
            r#"
            SELECT captured_at, soil_moisture_pct, temperature_c, humidity_pct, ph_level
            FROM sensor_readings
            ORDER BY captured_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load recent readings")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn thresholds(&self, scope: &str) -> Result<Vec<ThresholdRule>> {
        let rows = sqlx::query_as::<_, ThresholdRow>(
            r#"
            SELECT id, sensor_kind, min_value, max_value, enabled
            FROM alert_thresholds
            WHERE scope = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load alert thresholds")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn save_threshold(&self, scope: &str, rule: &ThresholdRule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alert_thresholds
                (id, scope, sensor_kind, min_value, max_value, enabled)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                scope       = EXCLUDED.scope,
                sensor_kind = EXCLUDED.sensor_kind,
                min_value   = EXCLUDED.min_value,
                max_value   = EXCLUDED.max_value,
                enabled     = EXCLUDED.enabled,
                updated_at  = now()
            "#,
        )
        .bind(&rule.id)
        .bind(scope)
        .bind(rule.sensor_kind.to_string())
        .bind(rule.min_value)
        .bind(rule.max_value)
        .bind(rule.enabled)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save threshold {}", rule.id))?;

        debug!(rule_id = %rule.id, scope = %scope, "Threshold persisted");
        Ok(())
    }
}
