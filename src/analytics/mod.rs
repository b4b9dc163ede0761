//! Dashboard analytics
//!
//! Turns raw view and lead events into a single report: top-ranked
//! entities, gap-filled daily and weekly series, a lead-status breakdown
//! and scalar totals.

pub mod bucket;
pub mod category;
pub mod models;
pub mod rank;
pub mod service;
pub mod summary;

pub use bucket::{bucketize, trailing_window_start, Aggregate, Granularity};
pub use category::{breakdown, Category, LeadStatus};
pub use models::{AnalyticsReport, CategoryCount, MetricRecord, RankedEntity, Summary, TimeBucket};
pub use rank::{top_n, totals_from_records};
pub use service::{AnalyticsError, AnalyticsService};
pub use summary::summarize;
