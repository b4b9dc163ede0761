pub mod analytics;
pub mod handlers;
pub mod routes;

pub use analytics::ReportResponse;
pub use handlers::AppState;
pub use routes::create_api_router;
