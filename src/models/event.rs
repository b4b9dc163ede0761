use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of business event captured by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Page view of an entity
    View,
    /// Inquiry / lead submitted against an entity
    Lead,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::View => "view",
            EventKind::Lead => "lead",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "view" => Some(EventKind::View),
            "lead" => Some(EventKind::Lead),
            _ => None,
        }
    }
}

/// A tracked entity (listing, article, ...) with its running metric
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entity {
    pub id: String,
    pub label: String,
    /// Accumulated value of all view events recorded against the entity
    pub metric: f64,
    pub created_at: i64,
}

/// Event to be appended to the store
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub entity_id: String,
    pub kind: EventKind,
    pub category: Option<String>,
    pub value: Option<f64>,
    /// Unix timestamp (seconds)
    pub occurred_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateEntityRequest {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEventRequest {
    pub entity_id: String,
    pub kind: EventKind,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    /// Defaults to the time the request is handled
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}
