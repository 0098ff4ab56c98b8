use std::ptr;

use chrono::{DateTime, Utc};

use super::{Alert, Severity};
use crate::{
    sensors::SensorSnapshot,
    thresholds::{effective, ThresholdRule},
};

/// Turn a snapshot and the configured rules into the alerts to display.
///
/// Pure: the same inputs always yield the same alerts (`now` is stamped on
/// every alert as `created_at`).
///
/// - Disabled rules and rules for kinds the snapshot has no value for are
///   skipped.
/// - When several enabled rules share a kind, only the last one is consulted.
/// - Output follows rule order; a rule's low alert precedes its high alert.
pub fn evaluate(snapshot: &SensorSnapshot, rules: &[ThresholdRule], now: DateTime<Utc>) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for rule in rules {
        if !effective(rules, &rule.sensor_kind).is_some_and(|e| ptr::eq(e, rule)) {
            continue;
        }
        let Some(value) = snapshot.value_of(&rule.sensor_kind) else {
            continue;
        };
        let label = rule.sensor_kind.label();

        if let Some(min) = rule.min_value {
            if value < min {
                alerts.push(Alert {
                    id: format!("{}-low", rule.id),
                    severity: Severity::Warning,
                    title: format!("{label} Low"),
                    message: format!("{label} is {value}, below minimum {min}"),
                    created_at: now,
                });
            }
        }

        if let Some(max) = rule.max_value {
            if value > max {
                alerts.push(Alert {
                    id: format!("{}-high", rule.id),
                    severity: Severity::Error,
                    title: format!("{label} High"),
                    message: format!("{label} is {value}, above maximum {max}"),
                    created_at: now,
                });
            }
        }
    }

    alerts
}
