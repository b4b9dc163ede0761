use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::analytics::{AnalyticsService, Category, LeadStatus};
use crate::clock::Clock;
use crate::models::{CreateEntityRequest, Entity, EventKind, NewEvent, RecordEventRequest};
use crate::storage::{EventStore, StorageError};

pub struct AppState {
    pub storage: Arc<dyn EventStore>,
    pub analytics: Arc<AnalyticsService>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    pub id: i64,
    pub entity_id: String,
    pub kind: EventKind,
    pub category: Option<String>,
    pub value: Option<f64>,
    pub occurred_at: i64,
}

pub(crate) fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Register a new entity
pub async fn create_entity(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateEntityRequest>,
) -> Result<(StatusCode, Json<Entity>), (StatusCode, Json<ErrorResponse>)> {
    let id = payload.id.trim();
    if id.is_empty() || id.len() > 64 {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "Entity id must be 1-64 characters",
        ));
    }
    if payload.label.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Label cannot be empty"));
    }

    let created_at = state.clock.now().timestamp();
    match state
        .storage
        .create_entity(id, payload.label.trim(), created_at)
        .await
    {
        Ok(entity) => Ok((StatusCode::CREATED, Json(entity))),
        Err(StorageError::Conflict) => Err(error(
            StatusCode::CONFLICT,
            "Entity already exists",
        )),
        Err(e) => {
            tracing::error!("Failed to create entity: {}", e);
            Err(error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create entity: {}", e),
            ))
        }
    }
}

/// Record a view or a lead against an entity.
///
/// Views default to a weight of 1. Leads default to `PENDING` and must
/// carry one of the known lead statuses.
pub async fn record_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RecordEventRequest>,
) -> Result<(StatusCode, Json<RecordedEvent>), (StatusCode, Json<ErrorResponse>)> {
    if payload.value.is_some_and(|v| !v.is_finite()) {
        return Err(error(StatusCode::BAD_REQUEST, "Value must be a finite number"));
    }

    let (category, value) = match payload.kind {
        EventKind::View => (payload.category, Some(payload.value.unwrap_or(1.0))),
        EventKind::Lead => {
            let status = match payload.category.as_deref() {
                None => LeadStatus::Pending,
                Some(raw) => LeadStatus::parse(raw).ok_or_else(|| {
                    error(
                        StatusCode::BAD_REQUEST,
                        format!("Unknown lead status '{raw}'"),
                    )
                })?,
            };
            (Some(status.as_str().to_string()), payload.value)
        }
    };

    let event = NewEvent {
        entity_id: payload.entity_id,
        kind: payload.kind,
        category,
        value,
        occurred_at: payload
            .timestamp
            .unwrap_or_else(|| state.clock.now())
            .timestamp(),
    };

    match state.storage.record_event(&event).await {
        Ok(id) => Ok((
            StatusCode::CREATED,
            Json(RecordedEvent {
                id,
                entity_id: event.entity_id,
                kind: event.kind,
                category: event.category,
                value: event.value,
                occurred_at: event.occurred_at,
            }),
        )),
        Err(StorageError::UnknownEntity(id)) => Err(error(
            StatusCode::NOT_FOUND,
            format!("Entity '{id}' not found"),
        )),
        Err(e) => {
            tracing::error!("Failed to record event: {}", e);
            Err(error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to record event: {}", e),
            ))
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
