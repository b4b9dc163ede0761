//! Report assembly
//!
//! The service reads the clock once, runs every store query concurrently
//! against that single instant and feeds the results through the pure
//! bucketing, ranking, breakdown and summary functions.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::analytics::bucket::{bucketize, trailing_window_start, Aggregate, Granularity};
use crate::analytics::category::{breakdown, Category, LeadStatus};
use crate::analytics::models::AnalyticsReport;
use crate::analytics::rank::top_n;
use crate::analytics::summary::summarize;
use crate::clock::Clock;
use crate::config::ReportConfig;
use crate::models::EventKind;
use crate::storage::{EventStore, Filter, FindOptions, StorageError, SumField};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A store query failed; the whole report is abandoned
    #[error("event store unavailable while loading {query}")]
    StoreUnavailable {
        query: &'static str,
        #[source]
        source: StorageError,
    },
}

pub struct AnalyticsService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    config: ReportConfig,
}

/// Tag a store query with a name for error reporting
async fn load<T, F>(query: &'static str, fut: F) -> Result<T, AnalyticsError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    fut.await
        .map_err(|source| AnalyticsError::StoreUnavailable { query, source })
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, config: ReportConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Build the dashboard report anchored at the clock's current time
    pub async fn generate_report(&self) -> Result<AnalyticsReport, AnalyticsError> {
        let now = self.clock.now();
        self.generate_report_at(now).await
    }

    /// Build the dashboard report anchored at `now`.
    ///
    /// Every query and every series uses this same instant. The first query
    /// to fail cancels the rest and no partial report is produced.
    pub async fn generate_report_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        info!(%now, "Generating analytics report");

        let daily_start = trailing_window_start(now, Granularity::Day, self.config.daily_window_days);
        let weekly_start =
            trailing_window_start(now, Granularity::Week, self.config.weekly_window_weeks);

        let top_options = FindOptions::top(self.config.top_entities as i64);
        let chronological = FindOptions::chronological();
        let daily_filter = Filter::events(EventKind::Lead).since(daily_start).until(now);
        let weekly_filter = Filter::events(EventKind::View).since(weekly_start).until(now);
        let leads = Filter::events(EventKind::Lead);
        let entities = Filter::entities();

        let store = self.store.as_ref();
        let (ranked, daily, weekly, categorized, entity_count, record_count, total_metric) = tokio::try_join!(
            load("top entities", store.find_entities(&top_options)),
            load("daily leads", store.find_many(&daily_filter, &chronological)),
            load("weekly views", store.find_many(&weekly_filter, &chronological)),
            load("lead statuses", store.find_many(&leads, &chronological)),
            load("entity count", store.count(&entities)),
            load("lead count", store.count(&leads)),
            load("metric total", store.sum_field(SumField::Metric, &entities)),
        )?;

        let report = AnalyticsReport {
            top_entities: top_n(ranked, self.config.top_entities),
            daily_series: bucketize(&daily, daily_start, now, Granularity::Day, Aggregate::Count),
            weekly_series: bucketize(&weekly, weekly_start, now, Granularity::Week, Aggregate::Sum),
            category_breakdown: breakdown(&categorized, LeadStatus::all()),
            summary: summarize(entity_count, record_count, [total_metric]),
            generated_at: now,
        };

        debug!(
            top_entities = report.top_entities.len(),
            daily_buckets = report.daily_series.len(),
            weekly_buckets = report.weekly_series.len(),
            leads = record_count,
            "Analytics report assembled"
        );

        Ok(report)
    }
}
