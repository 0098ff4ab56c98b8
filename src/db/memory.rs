use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::ReadingStore;
use crate::{
    sensors::{ReadingHistoryEntry, SensorSnapshot},
    thresholds::ThresholdRule,
};

/// Readings kept before the oldest are dropped.
const MAX_READINGS: usize = 1_000;

/// Process-local `ReadingStore`, used when no database is configured.
///
/// Cheap to clone; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    readings: Vec<ReadingHistoryEntry>,
    /// Rules per scope, in first-saved order.
    thresholds: HashMap<String, Vec<ThresholdRule>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rules, as if they had been saved earlier.
    pub async fn with_thresholds(self, scope: &str, rules: Vec<ThresholdRule>) -> Self {
        self.inner
            .write()
            .await
            .thresholds
            .insert(scope.to_owned(), rules);
        self
    }

    /// Seed readings, as if they had been saved earlier.
    pub async fn with_readings(self, readings: Vec<ReadingHistoryEntry>) -> Self {
        self.inner.write().await.readings.extend(readings);
        self
    }

    pub async fn reading_count(&self) -> usize {
        self.inner.read().await.readings.len()
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn save_reading(
        &self,
        snapshot: &SensorSnapshot,
        captured_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .readings
            .push(ReadingHistoryEntry::from_snapshot(snapshot, captured_at));
        if inner.readings.len() > MAX_READINGS {
            let excess = inner.readings.len() - MAX_READINGS;
            inner.readings.drain(..excess);
        }
        Ok(())
    }

    async fn latest_readings(&self, limit: usize) -> Result<Vec<ReadingHistoryEntry>> {
        let mut readings = self.inner.read().await.readings.clone();
        readings.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        readings.truncate(limit);
        Ok(readings)
    }

    async fn thresholds(&self, scope: &str) -> Result<Vec<ThresholdRule>> {
        Ok(self
            .inner
            .read()
            .await
            .thresholds
            .get(scope)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_threshold(&self, scope: &str, rule: &ThresholdRule) -> Result<()> {
        let mut inner = self.inner.write().await;
        // Ids are unique across scopes; saving under a new scope moves the rule.
        for (_, rules) in inner.thresholds.iter_mut().filter(|(s, _)| s.as_str() != scope) {
            rules.retain(|r| r.id != rule.id);
        }
        let rules = inner.thresholds.entry(scope.to_owned()).or_default();
        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule.clone(),
            None => rules.push(rule.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::sensors::SensorKind;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 7, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    #[tokio::test]
    async fn latest_readings_are_most_recent_first_and_limited() {
        let store = MemoryStore::new();
        for m in [3, 1, 2] {
            let snapshot = SensorSnapshot {
                soil_moisture_pct: m as f64,
                ..Default::default()
            };
            store.save_reading(&snapshot, at(m)).await.unwrap();
        }

        let latest = store.latest_readings(2).await.unwrap();
        let minutes: Vec<_> = latest.iter().map(|e| e.captured_at).collect();
        assert_eq!(minutes, [at(3), at(2)]);
    }

    #[tokio::test]
    async fn save_threshold_upserts_by_id_within_scope() {
        let store = MemoryStore::new();
        let mut rule = ThresholdRule::new(SensorKind::Humidity, Some(30.0), Some(80.0));
        store.save_threshold("public", &rule).await.unwrap();

        rule.max_value = Some(70.0);
        store.save_threshold("public", &rule).await.unwrap();

        let saved = store.thresholds("public").await.unwrap();
        assert_eq!(saved, [rule]);
        assert!(store.thresholds("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn saving_under_another_scope_moves_the_rule() {
        let store = MemoryStore::new();
        let mut rule = ThresholdRule::new(SensorKind::PhLevel, Some(5.5), Some(7.5));
        store.save_threshold("public", &rule).await.unwrap();

        rule.min_value = Some(6.0);
        store.save_threshold("greenhouse", &rule).await.unwrap();

        assert!(store.thresholds("public").await.unwrap().is_empty());
        assert_eq!(store.thresholds("greenhouse").await.unwrap(), [rule]);
    }

    #[tokio::test]
    async fn readings_are_capped() {
        let store = MemoryStore::new();
        let snapshot = SensorSnapshot::default();
        for m in 0..(MAX_READINGS as i64 + 5) {
            store.save_reading(&snapshot, at(m)).await.unwrap();
        }
        assert_eq!(store.reading_count().await, MAX_READINGS);
    }
}
