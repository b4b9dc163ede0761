use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vantage::analytics::AnalyticsService;
use vantage::api::{self, AppState};
use vantage::clock::{Clock, SystemClock};
use vantage::config::{Config, DatabaseBackend};
use vantage::storage::{EventStore, PostgresStorage, SqliteStorage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage: Arc<dyn EventStore> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(SqliteStorage::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    // Initialize database
    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let analytics = Arc::new(AnalyticsService::new(
        Arc::clone(&storage),
        Arc::clone(&clock),
        config.report,
    ));
    info!(
        "📊 Report windows: {} days daily, {} weeks weekly, top {} entities",
        config.report.daily_window_days,
        config.report.weekly_window_weeks,
        config.report.top_entities
    );

    let state = Arc::new(AppState {
        storage,
        analytics,
        clock,
    });
    let api_router = api::create_api_router(state, config.cors_allow_any);

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - Report available at http://{}/api/analytics/report", api_addr);

    axum::serve(api_listener, api_router).await?;

    Ok(())
}
