use crate::analytics::{MetricRecord, RankedEntity};
use crate::models::{Entity, EventKind, NewEvent};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("entity already exists")]
    Conflict,
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Other(e.into())
    }
}

/// Collection a query reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Entities,
    Events(EventKind),
}

impl Source {
    pub(crate) fn table(self) -> &'static str {
        match self {
            Source::Entities => "entities",
            Source::Events(_) => "events",
        }
    }

    pub(crate) fn time_column(self) -> &'static str {
        match self {
            Source::Entities => "created_at",
            Source::Events(_) => "occurred_at",
        }
    }

    /// Select list producing a [`RecordRow`]
    pub(crate) fn record_columns(self) -> &'static str {
        match self {
            Source::Entities => {
                "id AS entity_id, created_at AS occurred_at, CAST(NULL AS TEXT) AS category, metric AS value"
            }
            Source::Events(_) => "entity_id, occurred_at, category, value",
        }
    }

    pub(crate) fn order_clause(self, order: Order) -> &'static str {
        match (self, order) {
            (Source::Entities, Order::Chronological) => " ORDER BY created_at ASC, seq ASC",
            (Source::Entities, Order::MetricDesc) => " ORDER BY metric DESC, seq ASC",
            (Source::Events(_), Order::Chronological) => " ORDER BY occurred_at ASC, id ASC",
            (Source::Events(_), Order::MetricDesc) => " ORDER BY COALESCE(value, 0) DESC, id ASC",
        }
    }
}

/// Row selection shared by every read query.
///
/// Time bounds are inclusive and apply to `created_at` for entities and to
/// `occurred_at` for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub source: Source,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl Filter {
    pub fn entities() -> Self {
        Self {
            source: Source::Entities,
            since: None,
            until: None,
        }
    }

    pub fn events(kind: EventKind) -> Self {
        Self {
            source: Source::Events(kind),
            since: None,
            until: None,
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    /// Oldest first, insertion order within the same second
    #[default]
    Chronological,
    /// Highest metric first, insertion order among equals
    MetricDesc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub order: Order,
    pub limit: Option<i64>,
}

impl FindOptions {
    pub fn chronological() -> Self {
        Self::default()
    }

    pub fn top(limit: i64) -> Self {
        Self {
            order: Order::MetricDesc,
            limit: Some(limit),
        }
    }
}

/// Numeric column that can be summed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SumField {
    /// Running metric of an entity
    Metric,
    /// Weight of an individual event
    Value,
}

impl SumField {
    /// Check that the field exists on the filter's source
    pub fn check(self, source: Source) -> StorageResult<()> {
        match (self, source) {
            (SumField::Metric, Source::Entities) | (SumField::Value, Source::Events(_)) => Ok(()),
            (field, source) => Err(StorageError::InvalidQuery(format!(
                "{field:?} cannot be summed over {source:?}"
            ))),
        }
    }
}

/// Read-side shape shared by the SQL backends
#[derive(Debug, FromRow)]
pub(crate) struct RecordRow {
    pub entity_id: String,
    pub occurred_at: i64,
    pub category: Option<String>,
    pub value: Option<f64>,
}

impl TryFrom<RecordRow> for MetricRecord {
    type Error = StorageError;

    fn try_from(row: RecordRow) -> StorageResult<Self> {
        let timestamp = DateTime::from_timestamp(row.occurred_at, 0)
            .ok_or_else(|| anyhow!("timestamp out of range: {}", row.occurred_at))?;

        Ok(MetricRecord {
            entity_id: row.entity_id,
            timestamp,
            category: row.category,
            value: row.value,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EntityTotalRow {
    pub id: String,
    pub label: String,
    pub metric: f64,
}

impl From<EntityTotalRow> for RankedEntity {
    fn from(row: EntityTotalRow) -> Self {
        RankedEntity {
            id: row.id,
            label: row.label,
            metric_value: row.metric,
        }
    }
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Register a new entity with a zero metric
    async fn create_entity(&self, id: &str, label: &str, created_at: i64)
        -> StorageResult<Entity>;

    /// Append an event. A view also adds its value to the entity's running
    /// metric. Returns the new event id.
    async fn record_event(&self, event: &NewEvent) -> StorageResult<i64>;

    /// Number of rows matching the filter
    async fn count(&self, filter: &Filter) -> StorageResult<i64>;

    /// Rows matching the filter as metric records. Entities map to records
    /// keyed by their id, stamped with `created_at` and valued by `metric`.
    async fn find_many(&self, filter: &Filter, options: &FindOptions)
        -> StorageResult<Vec<MetricRecord>>;

    /// Entities projected to `{id, label, metric}`
    async fn find_entities(&self, options: &FindOptions) -> StorageResult<Vec<RankedEntity>>;

    /// Sum of a numeric field, `None` when no row contributes
    async fn sum_field(&self, field: SumField, filter: &Filter) -> StorageResult<Option<f64>>;
}
