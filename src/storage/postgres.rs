use crate::analytics::{MetricRecord, RankedEntity};
use crate::models::{Entity, EventKind, NewEvent};
use crate::storage::trait_def::{EntityTotalRow, RecordRow};
use crate::storage::{EventStore, Filter, FindOptions, Source, StorageError, StorageResult, SumField};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
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
impl EventStore for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                seq BIGSERIAL PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                label TEXT NOT NULL,
                metric DOUBLE PRECISION NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id BIGSERIAL PRIMARY KEY,
                entity_id TEXT NOT NULL REFERENCES entities(id),
                kind TEXT NOT NULL,
                category TEXT,
                value DOUBLE PRECISION,
                occurred_at BIGINT NOT NULL
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
        let row = sqlx::query_as::<_, Entity>(
            r#"
            INSERT INTO entities (id, label, metric, created_at)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, label, metric, created_at
            "#,
        )
        .bind(id)
        .bind(label)
        .bind(created_at)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.ok_or(StorageError::Conflict)
    }

    async fn record_event(&self, event: &NewEvent) -> StorageResult<i64> {
        let mut tx = self.pool.begin().await?;

        let known = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM entities WHERE id = $1")
            .bind(&event.entity_id)
            .fetch_one(&mut *tx)
            .await?;
        if known == 0 {
            return Err(StorageError::UnknownEntity(event.entity_id.clone()));
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO events (entity_id, kind, category, value, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&event.entity_id)
        .bind(event.kind.as_str())
        .bind(event.category.as_deref())
        .bind(event.value)
        .bind(event.occurred_at)
        .fetch_one(&mut *tx)
        .await?;

        if event.kind == EventKind::View {
            sqlx::query("UPDATE entities SET metric = metric + $1 WHERE id = $2")
                .bind(event.value.unwrap_or(0.0))
                .bind(&event.entity_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(id)
    }

    async fn count(&self, filter: &Filter) -> StorageResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ");
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
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
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
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id, label, metric FROM entities");
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

        let mut qb = QueryBuilder::<Postgres>::new("SELECT SUM(");
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
