use crate::analytics::{MetricRecord, RankedEntity};
use crate::models::{Entity, EventKind, NewEvent};
use crate::storage::trait_def::{EntityTotalRow, RecordRow};
use crate::storage::{EventStore, Filter, FindOptions, Source, StorageError, StorageResult, SumField};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

/// Append the WHERE clause for `filter` to a query over `filter.source`
fn push_conditions(qb: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) {
    match filter.source {
        Source::Entities => {
            qb.push(" WHERE 1 = 1");
        }
        Source::Events(kind) => {
            qb.push(" WHERE kind = ").push_bind(kind.as_str());
        }
    }

    let column = filter.source.time_column();
    if let Some(since) = filter.since {
        qb.push(format!(" AND {column} >= ")).push_bind(since.timestamp());
    }
    if let Some(until) = filter.until {
        qb.push(format!(" AND {column} <= ")).push_bind(until.timestamp());
    }
}

#[async_trait]
impl EventStore for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                label TEXT NOT NULL,
                metric REAL NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id TEXT NOT NULL REFERENCES entities(id),
                kind TEXT NOT NULL,
                category TEXT,
                value REAL,
                occurred_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_kind_time ON events(kind, occurred_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_metric ON entities(metric)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_entity(
        &self,
        id: &str,
        label: &str,
        created_at: i64,
    ) -> StorageResult<Entity> {
        let result = sqlx::query(
            r#"
            INSERT INTO entities (id, label, metric, created_at)
            VALUES (?, ?, 0, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(label)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        let entity = sqlx::query_as::<_, Entity>(
            r#"
            SELECT id, label, metric, created_at
            FROM entities
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(entity)
    }

    async fn record_event(&self, event: &NewEvent) -> StorageResult<i64> {
        let mut tx = self.pool.begin().await?;

        let known = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entities WHERE id = ?")
            .bind(&event.entity_id)
            .fetch_one(&mut *tx)
            .await?;
        if known == 0 {
            return Err(StorageError::UnknownEntity(event.entity_id.clone()));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO events (entity_id, kind, category, value, occurred_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.entity_id)
        .bind(event.kind.as_str())
        .bind(event.category.as_deref())
        .bind(event.value)
        .bind(event.occurred_at)
        .execute(&mut *tx)
        .await?;

        if event.kind == EventKind::View {
            sqlx::query("UPDATE entities SET metric = metric + ? WHERE id = ?")
                .bind(event.value.unwrap_or(0.0))
                .bind(&event.entity_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(result.last_insert_rowid())
    }

    async fn count(&self, filter: &Filter) -> StorageResult<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        qb.push(filter.source.table());
        push_conditions(&mut qb, filter);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn find_many(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> StorageResult<Vec<MetricRecord>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        qb.push(filter.source.record_columns())
            .push(" FROM ")
            .push(filter.source.table());
        push_conditions(&mut qb, filter);
        qb.push(filter.source.order_clause(options.order));
        if let Some(limit) = options.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        qb.build_query_as::<RecordRow>()
            .fetch_all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(MetricRecord::try_from)
            .collect()
    }

    async fn find_entities(&self, options: &FindOptions) -> StorageResult<Vec<RankedEntity>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, label, metric FROM entities");
        qb.push(Source::Entities.order_clause(options.order));
        if let Some(limit) = options.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let rows = qb
            .build_query_as::<EntityTotalRow>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows.into_iter().map(RankedEntity::from).collect())
    }

    async fn sum_field(&self, field: SumField, filter: &Filter) -> StorageResult<Option<f64>> {
        field.check(filter.source)?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT SUM(");
        qb.push(match field {
            SumField::Metric => "metric",
            SumField::Value => "value",
        })
        .push(") FROM ")
        .push(filter.source.table());
        push_conditions(&mut qb, filter);

        let total = qb
            .build_query_scalar::<Option<f64>>()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(total)
    }
}
