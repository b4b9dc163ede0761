//! Data models for analytics reports

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single observed event as read from the event store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    /// Entity the event belongs to
    pub entity_id: String,

    /// When the event happened
    pub timestamp: DateTime<Utc>,

    /// Categorical tag (e.g. lead status)
    #[serde(default)]
    pub category: Option<String>,

    /// Numeric weight, treated as 0 when absent
    #[serde(default)]
    pub value: Option<f64>,
}

/// One calendar-aligned slot of a time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// First calendar day covered by the bucket
    pub start: NaiveDate,

    /// Record count or summed value, depending on the aggregate mode
    pub value: f64,
}

impl TimeBucket {
    pub fn empty(start: NaiveDate) -> Self {
        Self { start, value: 0.0 }
    }
}

/// An entity placed in the top-N ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntity {
    pub id: String,
    pub label: String,
    pub metric_value: f64,
}

/// Number of records carrying one known category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// Scalar totals shown alongside the series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub entity_count: i64,
    pub record_count: i64,
    pub total_value: f64,
}

/// Root aggregate produced once per report request
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    pub top_entities: Vec<RankedEntity>,
    pub daily_series: Vec<TimeBucket>,
    pub weekly_series: Vec<TimeBucket>,
    pub category_breakdown: Vec<CategoryCount>,
    pub summary: Summary,
    /// The single "now" every section was computed against
    pub generated_at: DateTime<Utc>,
}
