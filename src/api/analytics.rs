//! Analytics API handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::sync::Arc;

use super::handlers::{error, AppState};
use crate::analytics::{AnalyticsReport, CategoryCount, RankedEntity, Summary};

/// Dashboard report as served to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub top_entities: Vec<RankedEntity>,
    pub daily_series: Vec<DailyPoint>,
    pub weekly_series: Vec<WeeklyPoint>,
    pub category_breakdown: CategoryBreakdown,
    pub summary: SummaryResponse,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    #[serde(serialize_with = "whole_number")]
    pub count: f64,
}

#[derive(Debug, Serialize)]
pub struct WeeklyPoint {
    pub week: NaiveDate,
    #[serde(serialize_with = "whole_number")]
    pub value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub entity_count: i64,
    pub record_count: i64,
    #[serde(serialize_with = "whole_number")]
    pub total_value: f64,
}

/// Category counts rendered as a JSON object in known-category order
#[derive(Debug)]
pub struct CategoryBreakdown(pub Vec<CategoryCount>);

impl Serialize for CategoryBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.category, &entry.count)?;
        }
        map.end()
    }
}

/// Emit integral values as JSON integers so counts read as `3`, not `3.0`
fn whole_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

impl From<&Summary> for SummaryResponse {
    fn from(summary: &Summary) -> Self {
        Self {
            entity_count: summary.entity_count,
            record_count: summary.record_count,
            total_value: summary.total_value,
        }
    }
}

impl From<AnalyticsReport> for ReportResponse {
    fn from(report: AnalyticsReport) -> Self {
        Self {
            top_entities: report.top_entities,
            daily_series: report
                .daily_series
                .iter()
                .map(|b| DailyPoint {
                    date: b.start,
                    count: b.value,
                })
                .collect(),
            weekly_series: report
                .weekly_series
                .iter()
                .map(|b| WeeklyPoint {
                    week: b.start,
                    value: b.value,
                })
                .collect(),
            category_breakdown: CategoryBreakdown(report.category_breakdown),
            summary: SummaryResponse::from(&report.summary),
            generated_at: report.generated_at,
        }
    }
}

/// Get the dashboard analytics report
pub async fn get_report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.analytics.generate_report().await {
        Ok(report) => Json(ReportResponse::from(report)).into_response(),
        Err(e) => {
            tracing::error!("Failed to generate analytics report: {:#}", anyhow::Error::new(e));
            error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Failed to generate analytics report",
            )
            .into_response()
        }
    }
}
