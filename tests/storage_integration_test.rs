//! Integration tests for the event store backends
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests (needs DATABASE_URL)
//! - By default, both backends are tested

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use vantage::models::{EventKind, NewEvent};
use vantage::storage::{
    EventStore, Filter, FindOptions, PostgresStorage, SqliteStorage, StorageError, SumField,
};

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true, // Test all backends if not specified
    }
}

/// Helper to create SQLite test storage
async fn create_sqlite_storage() -> Arc<dyn EventStore> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Helper to create PostgreSQL test storage
async fn create_postgres_storage() -> Option<Arc<dyn EventStore>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

fn event(entity_id: &str, kind: EventKind, category: Option<&str>, value: Option<f64>, at: DateTime<Utc>) -> NewEvent {
    NewEvent {
        entity_id: entity_id.to_string(),
        kind,
        category: category.map(str::to_string),
        value,
        occurred_at: at.timestamp(),
    }
}

/// Runs the shared read/write checks against any backend. Entity ids are
/// prefixed so repeated runs against a persistent database do not collide.
async fn exercise_store(storage: Arc<dyn EventStore>, prefix: &str) {
    let first = format!("{prefix}-first");
    let second = format!("{prefix}-second");

    let entity = storage
        .create_entity(&first, "First", base().timestamp())
        .await
        .unwrap();
    assert_eq!(entity.id, first);
    assert_eq!(entity.metric, 0.0);

    storage
        .create_entity(&second, "Second", base().timestamp())
        .await
        .unwrap();

    let conflict = storage.create_entity(&first, "Again", 0).await;
    assert!(matches!(conflict, Err(StorageError::Conflict)));

    storage
        .record_event(&event(&first, EventKind::View, None, Some(3.0), base()))
        .await
        .unwrap();
    storage
        .record_event(&event(&second, EventKind::View, None, Some(3.0), base()))
        .await
        .unwrap();
    storage
        .record_event(&event(&first, EventKind::Lead, Some("PENDING"), None, base() - Duration::days(2)))
        .await
        .unwrap();
    storage
        .record_event(&event(&second, EventKind::Lead, Some("CLOSED"), None, base()))
        .await
        .unwrap();

    let missing = storage
        .record_event(&event(&format!("{prefix}-missing"), EventKind::View, None, None, base()))
        .await;
    assert!(matches!(missing, Err(StorageError::UnknownEntity(_))));

    // Leads in a window, oldest first
    let window = Filter::events(EventKind::Lead)
        .since(base() - Duration::days(3))
        .until(base());
    let leads = storage
        .find_many(&window, &FindOptions::chronological())
        .await
        .unwrap();
    let ours: Vec<_> = leads
        .iter()
        .filter(|r| r.entity_id.starts_with(prefix))
        .collect();
    assert_eq!(ours.len(), 2);
    assert_eq!(ours[0].entity_id, first);
    assert_eq!(ours[0].category.as_deref(), Some("PENDING"));
    assert_eq!(ours[0].timestamp, base() - Duration::days(2));
    assert_eq!(ours[1].category.as_deref(), Some("CLOSED"));

    // Views bumped the running metric; equal metrics keep insertion order
    let top = storage.find_entities(&FindOptions::top(100)).await.unwrap();
    let ours: Vec<_> = top.iter().filter(|e| e.id.starts_with(prefix)).collect();
    assert_eq!(ours.len(), 2);
    assert_eq!(ours[0].id, first);
    assert_eq!(ours[0].metric_value, 3.0);
    assert_eq!(ours[1].id, second);

    let inverted = SumField::Metric.check(Filter::events(EventKind::View).source);
    assert!(matches!(inverted, Err(StorageError::InvalidQuery(_))));
    let bad_sum = storage
        .sum_field(SumField::Value, &Filter::entities())
        .await;
    assert!(matches!(bad_sum, Err(StorageError::InvalidQuery(_))));
}

#[tokio::test]
async fn test_store_roundtrip_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    exercise_store(create_sqlite_storage().await, "sqlite").await;
}

#[tokio::test]
async fn test_store_roundtrip_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        println!("SKIPPED: PostgreSQL not configured");
        return;
    };
    let prefix = format!("pg-{}", Utc::now().timestamp_micros());
    exercise_store(storage, &prefix).await;
}

#[tokio::test]
async fn test_counts_and_sums_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    let storage = create_sqlite_storage().await;

    assert_eq!(storage.count(&Filter::entities()).await.unwrap(), 0);
    assert_eq!(
        storage
            .sum_field(SumField::Metric, &Filter::entities())
            .await
            .unwrap(),
        None
    );

    storage.create_entity("a", "A", base().timestamp()).await.unwrap();
    storage.create_entity("b", "B", base().timestamp()).await.unwrap();
    storage
        .record_event(&event("a", EventKind::View, None, Some(2.5), base()))
        .await
        .unwrap();
    storage
        .record_event(&event("b", EventKind::View, None, None, base() - Duration::days(10)))
        .await
        .unwrap();
    storage
        .record_event(&event("a", EventKind::Lead, Some("ARCHIVED"), None, base()))
        .await
        .unwrap();

    assert_eq!(storage.count(&Filter::entities()).await.unwrap(), 2);
    assert_eq!(
        storage.count(&Filter::events(EventKind::View)).await.unwrap(),
        2
    );
    assert_eq!(
        storage
            .count(&Filter::events(EventKind::View).since(base() - Duration::days(1)))
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        storage.count(&Filter::events(EventKind::Lead)).await.unwrap(),
        1
    );

    // A view without a value leaves the metric untouched
    assert_eq!(
        storage
            .sum_field(SumField::Metric, &Filter::entities())
            .await
            .unwrap(),
        Some(2.5)
    );
    assert_eq!(
        storage
            .sum_field(SumField::Value, &Filter::events(EventKind::View))
            .await
            .unwrap(),
        Some(2.5)
    );
    assert_eq!(
        storage
            .sum_field(SumField::Value, &Filter::events(EventKind::Lead))
            .await
            .unwrap(),
        None
    );

    // Entities read back as records carrying their metric
    let records = storage
        .find_many(&Filter::entities(), &FindOptions::top(1))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entity_id, "a");
    assert_eq!(records[0].value, Some(2.5));
    assert_eq!(records[0].category, None);
}
