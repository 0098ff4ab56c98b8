use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::sensors::SensorKind;

/// A configured min/max band for one sensor kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdRule {
    /// Opaque, stable identifier. Alert ids are derived from it.
    pub id: String,
    #[schema(value_type = String, example = "soilMoisture")]
    pub sensor_kind: SensorKind,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub enabled: bool,
}

impl ThresholdRule {
    /// A new enabled rule with a freshly generated id.
    pub fn new(sensor_kind: SensorKind, min_value: Option<f64>, max_value: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sensor_kind,
            min_value,
            max_value,
            enabled: true,
        }
    }
}

/// The rule consulted for `kind`: the last enabled one.
pub fn effective<'a>(rules: &'a [ThresholdRule], kind: &SensorKind) -> Option<&'a ThresholdRule> {
    rules
        .iter()
        .rev()
        .find(|r| r.enabled && &r.sensor_kind == kind)
}

/// Ordered collection of threshold rules, edited by kind.
///
/// Order matters: when several enabled rules share a kind the evaluator
/// consults the last one. `upsert` edits the last rule of a kind.
#[derive(Debug, Clone, Default)]
pub struct ThresholdConfigStore {
    rules: Vec<ThresholdRule>,
}

impl ThresholdConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bounds of the rule for `kind`, or create an enabled one.
    ///
    /// The id and enabled flag of an existing rule are preserved. Returns the
    /// resulting rule and whether it was newly created.
    pub fn upsert(
        &mut self,
        kind: SensorKind,
        min_value: Option<f64>,
        max_value: Option<f64>,
    ) -> (ThresholdRule, bool) {
        if let Some(rule) = self.rules.iter_mut().rev().find(|r| r.sensor_kind == kind) {
            rule.min_value = min_value;
            rule.max_value = max_value;
            return (rule.clone(), false);
        }

        let rule = ThresholdRule::new(kind, min_value, max_value);
        self.rules.push(rule.clone());
        (rule, true)
    }

    /// Fold in rules loaded from persistence.
    ///
    /// Loaded rules go in front of anything already present, so rules edited
    /// locally before the load finished keep taking precedence. Loaded rules
    /// whose id is already known locally are dropped.
    pub fn merge_loaded(&mut self, loaded: Vec<ThresholdRule>) {
        let mut merged: Vec<ThresholdRule> = loaded
            .into_iter()
            .filter(|l| !self.rules.iter().any(|r| r.id == l.id))
            .collect();
        merged.append(&mut self.rules);
        self.rules = merged;
    }

    pub fn all(&self) -> &[ThresholdRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
