use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    alerts::Alert,
    feed::DataSource,
    sensors::{ReadingHistoryEntry, SensorSnapshot},
    thresholds::ThresholdRule,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Idle,
    Subscribing,
    Live,
    Error,
}

/// Everything the front end renders, as of the last mutation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardView {
    pub source: DataSource,
    pub status: FeedStatus,
    /// `None` until the first payload is accepted.
    pub snapshot: Option<SensorSnapshot>,
    pub alerts: Vec<Alert>,
    /// Oldest first.
    pub history: Vec<ReadingHistoryEntry>,
    pub thresholds: Vec<ThresholdRule>,
    pub last_update: Option<DateTime<Utc>>,
    /// Persistent banner for a failed source.
    pub error: Option<String>,
    /// Informational message, e.g. the feed path is empty.
    pub notice: Option<String>,
}
