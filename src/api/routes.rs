use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::analytics::get_report;
use super::handlers::{create_entity, health_check, record_event, AppState};

pub fn create_api_router(state: Arc<AppState>, cors_allow_any: bool) -> Router {
    let api_routes = Router::new()
        .route("/analytics/report", get(get_report))
        .route("/entities", post(create_entity))
        .route("/events", post(record_event))
        .with_state(state);

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes);

    if cors_allow_any {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
