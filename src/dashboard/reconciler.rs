use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::view::{DashboardView, FeedStatus};
use crate::{
    alerts::{evaluate, AlertStore},
    feed::{DataSource, FeedError},
    history::ReadingHistory,
    sensors::{is_empty_payload, normalize, ReadingHistoryEntry, SensorKind, SensorSnapshot},
    thresholds::{ThresholdConfigStore, ThresholdRule},
};

/// Owns everything the dashboard shows and applies feed events to it.
///
/// ```text
///   Idle ──start──▶ Subscribing ──payload──▶ Live
///    ▲                   │                    │
///    └──switch_source────┴──transport error───┴──▶ Error
/// ```
///
/// Data only flows in `Subscribing` and `Live`; anything that arrives in
/// `Idle` or `Error` comes from a source that is no longer wanted.
#[derive(Debug)]
pub struct LiveFeedReconciler {
    source: DataSource,
    status: FeedStatus,
    snapshot: Option<SensorSnapshot>,
    alerts: AlertStore,
    history: ReadingHistory,
    thresholds: ThresholdConfigStore,
    last_update: Option<DateTime<Utc>>,
    error: Option<String>,
    notice: Option<String>,
    feed_path: String,
}

impl LiveFeedReconciler {
    pub fn new(source: DataSource, history_limit: usize, feed_path: impl Into<String>) -> Self {
        Self {
            source,
            status: FeedStatus::Idle,
            snapshot: None,
            alerts: AlertStore::new(),
            history: ReadingHistory::new(history_limit),
            thresholds: ThresholdConfigStore::new(),
            last_update: None,
            error: None,
            notice: None,
            feed_path: feed_path.into(),
        }
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn snapshot(&self) -> Option<&SensorSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// A subscription to `source` is being opened.
    pub fn start(&mut self, source: DataSource) {
        info!(?source, "Subscribing to data source");
        self.source = source;
        self.status = FeedStatus::Subscribing;
        self.error = None;
        self.notice = None;
    }

    /// Apply a raw payload from the live feed.
    ///
    /// Returns the accepted snapshot, if any, so the caller can persist it.
    pub fn on_payload(&mut self, payload: Option<Value>, now: DateTime<Utc>) -> Option<SensorSnapshot> {
        if !self.accepts_data() {
            debug!(status = ?self.status, "Dropping payload outside an active subscription");
            return None;
        }

        let payload = match payload {
            Some(value) if !is_empty_payload(Some(&value)) => value,
            _ => {
                info!(path = %self.feed_path, "Live feed has no data at path");
                self.notice = Some(format!(
                    "Connected to the live feed, but no data found at the \"{}\" path.",
                    self.feed_path
                ));
                return None;
            }
        };

        match normalize(&payload) {
            Ok(snapshot) => Some(self.accept(snapshot, now)),
            Err(e) => {
                warn!(error = %e, "Malformed sensor payload");
                self.notice = Some(format!("Received malformed sensor data: {e}."));
                None
            }
        }
    }

    /// Apply an already-canonical snapshot (generator path).
    pub fn on_snapshot(&mut self, snapshot: SensorSnapshot, now: DateTime<Utc>) -> Option<SensorSnapshot> {
        if !self.accepts_data() {
            debug!(status = ?self.status, "Dropping snapshot outside an active subscription");
            return None;
        }
        Some(self.accept(snapshot, now))
    }

    /// The active source failed. The last snapshot stays on screen.
    pub fn on_transport_error(&mut self, error: &FeedError) {
        if !self.accepts_data() {
            debug!(error = %error, "Ignoring transport error outside an active subscription");
            return;
        }
        warn!(source = ?self.source, error = %error, "Data source failed");
        self.status = FeedStatus::Error;
        self.error = Some(error.to_string());
    }

    /// The current subscription has been torn down.
    pub fn switch_source(&mut self) {
        self.status = FeedStatus::Idle;
    }

    pub fn dismiss_alert(&mut self, id: &str) -> bool {
        self.alerts.dismiss(id)
    }

    /// Edit or create the rule for `kind`. Takes effect on the next
    /// evaluation cycle.
    pub fn upsert_threshold(
        &mut self,
        kind: SensorKind,
        min_value: Option<f64>,
        max_value: Option<f64>,
    ) -> (ThresholdRule, bool) {
        self.thresholds.upsert(kind, min_value, max_value)
    }

    pub fn load_history(&mut self, entries: Vec<ReadingHistoryEntry>) {
        debug!(count = entries.len(), "History loaded");
        self.history.load(entries);
    }

    pub fn load_thresholds(&mut self, rules: Vec<ThresholdRule>) {
        debug!(count = rules.len(), "Thresholds loaded");
        self.thresholds.merge_loaded(rules);
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            source: self.source,
            status: self.status,
            snapshot: self.snapshot,
            alerts: self.alerts.active().to_vec(),
            history: self.history.entries(),
            thresholds: self.thresholds.all().to_vec(),
            last_update: self.last_update,
            error: self.error.clone(),
            notice: self.notice.clone(),
        }
    }

    fn accepts_data(&self) -> bool {
        matches!(self.status, FeedStatus::Subscribing | FeedStatus::Live)
    }

    /// Snapshot → alerts → history, as one step.
    fn accept(&mut self, snapshot: SensorSnapshot, now: DateTime<Utc>) -> SensorSnapshot {
        let alerts = evaluate(&snapshot, self.thresholds.all(), now);
        if !alerts.is_empty() {
            debug!(count = alerts.len(), "Threshold violations");
        }
        self.alerts.replace_all(alerts);
        self.history
            .append(ReadingHistoryEntry::from_snapshot(&snapshot, now));

        self.snapshot = Some(snapshot);
        self.last_update = Some(now);
        self.status = FeedStatus::Live;
        self.notice = None;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 7, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn live() -> LiveFeedReconciler {
        let mut r = LiveFeedReconciler::new(DataSource::Live, 24, "sensors");
        r.start(DataSource::Live);
        r
    }

    fn payload(soil: f64) -> Option<Value> {
        Some(json!({
            "soil_moisture": soil,
            "temperature": 24.5,
            "humidity": 61,
            "ph_level": 6.8,
            "water_pump": 1
        }))
    }

    #[test]
    fn starts_idle_and_subscribing_clears_messages() {
        let mut r = LiveFeedReconciler::new(DataSource::Live, 24, "sensors");
        assert_eq!(r.status(), FeedStatus::Idle);
        assert!(r.view().snapshot.is_none());

        r.start(DataSource::Live);
        r.on_transport_error(&FeedError::Closed);
        r.start(DataSource::Generator);

        assert_eq!(r.status(), FeedStatus::Subscribing);
        assert_eq!(r.source(), DataSource::Generator);
        assert!(r.error().is_none());
    }

    #[test]
    fn valid_payload_runs_full_pipeline() {
        let mut r = live();
        let (rule, _) = r.upsert_threshold(SensorKind::SoilMoisture, Some(30.0), Some(70.0));

        let accepted = r.on_payload(payload(20.0), at(0)).unwrap();

        assert!(accepted.pump_on);
        assert_eq!(r.status(), FeedStatus::Live);
        let view = r.view();
        assert_eq!(view.snapshot, Some(accepted));
        assert_eq!(view.last_update, Some(at(0)));
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.alerts.len(), 1);
        assert_eq!(view.alerts[0].id, format!("{}-low", rule.id));
    }

    #[test]
    fn alerts_are_replaced_each_cycle() {
        let mut r = live();
        r.upsert_threshold(SensorKind::SoilMoisture, Some(30.0), Some(70.0));

        r.on_payload(payload(20.0), at(0));
        assert_eq!(r.view().alerts.len(), 1);

        r.on_payload(payload(50.0), at(1));
        assert!(r.view().alerts.is_empty());
    }

    #[test]
    fn empty_payload_keeps_snapshot_and_sets_notice() {
        let mut r = live();
        r.on_payload(payload(42.0), at(0));

        assert!(r.on_payload(None, at(1)).is_none());
        assert!(r.on_payload(Some(json!({})), at(2)).is_none());

        assert_eq!(r.status(), FeedStatus::Live);
        assert_eq!(r.snapshot().unwrap().soil_moisture_pct, 42.0);
        assert_eq!(
            r.notice(),
            Some("Connected to the live feed, but no data found at the \"sensors\" path.")
        );
        assert!(r.error().is_none());
        assert_eq!(r.view().history.len(), 1);
    }

    #[test]
    fn empty_payload_while_subscribing_stays_subscribing() {
        let mut r = live();
        r.on_payload(Some(Value::Null), at(0));
        assert_eq!(r.status(), FeedStatus::Subscribing);
        assert!(r.notice().is_some());
    }

    #[test]
    fn next_valid_payload_clears_notice() {
        let mut r = live();
        r.on_payload(None, at(0));
        r.on_payload(payload(50.0), at(1));
        assert!(r.notice().is_none());
    }

    #[test]
    fn malformed_payload_sets_notice_only() {
        let mut r = live();
        r.on_payload(payload(42.0), at(0));

        assert!(r.on_payload(Some(json!([1, 2, 3])), at(1)).is_none());

        assert_eq!(r.status(), FeedStatus::Live);
        assert_eq!(r.snapshot().unwrap().soil_moisture_pct, 42.0);
        assert!(r.notice().unwrap().contains("malformed"));
        assert!(r.error().is_none());
    }

    #[test]
    fn transport_error_keeps_snapshot() {
        let mut r = live();
        r.on_payload(payload(42.0), at(0));

        r.on_transport_error(&FeedError::PermissionDenied);

        assert_eq!(r.status(), FeedStatus::Error);
        assert!(r.error().unwrap().contains("Permission denied"));
        assert_eq!(r.snapshot().unwrap().soil_moisture_pct, 42.0);
    }

    #[test]
    fn data_is_ignored_in_idle_and_error() {
        let mut r = live();
        r.on_transport_error(&FeedError::Closed);
        assert!(r.on_payload(payload(10.0), at(0)).is_none());
        assert!(r.on_snapshot(SensorSnapshot::default(), at(0)).is_none());

        r.switch_source();
        assert_eq!(r.status(), FeedStatus::Idle);
        assert!(r.on_payload(payload(10.0), at(1)).is_none());
        r.on_transport_error(&FeedError::Closed);

        assert_eq!(r.status(), FeedStatus::Idle);
        assert!(r.snapshot().is_none());
        assert!(r.view().history.is_empty());
    }

    #[test]
    fn generator_snapshot_skips_normalization() {
        let mut r = LiveFeedReconciler::new(DataSource::Generator, 24, "sensors");
        r.start(DataSource::Generator);
        let snapshot = SensorSnapshot {
            pump_on: true,
            soil_moisture_pct: 55.0,
            flow_rate_lpm: Some(1.2),
            ..Default::default()
        };

        assert_eq!(r.on_snapshot(snapshot, at(0)), Some(snapshot));
        assert_eq!(r.status(), FeedStatus::Live);
    }

    #[test]
    fn threshold_edit_applies_on_next_cycle() {
        let mut r = live();
        r.on_payload(payload(20.0), at(0));
        assert!(r.view().alerts.is_empty());

        r.upsert_threshold(SensorKind::SoilMoisture, Some(30.0), None);
        assert!(r.view().alerts.is_empty());

        r.on_payload(payload(20.0), at(1));
        assert_eq!(r.view().alerts.len(), 1);
    }

    #[test]
    fn dismissed_alert_reappears_while_violated() {
        let mut r = live();
        let (rule, _) = r.upsert_threshold(SensorKind::SoilMoisture, None, Some(70.0));
        r.on_payload(payload(90.0), at(0));

        let id = format!("{}-high", rule.id);
        assert!(r.dismiss_alert(&id));
        assert!(r.view().alerts.is_empty());

        r.on_payload(payload(90.0), at(1));
        assert_eq!(r.view().alerts[0].id, id);
    }

    #[test]
    fn loaded_history_is_sorted_and_capped() {
        let mut r = LiveFeedReconciler::new(DataSource::Live, 2, "sensors");
        let entry = |m| ReadingHistoryEntry::from_snapshot(&SensorSnapshot::default(), at(m));
        r.load_history(vec![entry(5), entry(1), entry(9)]);

        let times: Vec<_> = r.view().history.iter().map(|e| e.captured_at).collect();
        assert_eq!(times, [at(5), at(9)]);
    }

    #[test]
    fn local_edit_wins_over_late_loaded_rule() {
        let mut r = live();
        r.upsert_threshold(SensorKind::SoilMoisture, Some(10.0), None);
        r.load_thresholds(vec![ThresholdRule {
            id: "db-1".into(),
            sensor_kind: SensorKind::SoilMoisture,
            min_value: Some(50.0),
            max_value: None,
            enabled: true,
        }]);

        r.on_payload(payload(20.0), at(0));
        assert!(r.view().alerts.is_empty());
        assert_eq!(r.view().thresholds[0].id, "db-1");
    }
}
