use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use std::sync::Arc;
use vantage::analytics::{AnalyticsService, Category, LeadStatus};
use vantage::api::ReportResponse;
use vantage::clock::{Clock, FixedClock, SystemClock};
use vantage::config::{Config, DatabaseBackend};
use vantage::models::{EventKind, NewEvent};
use vantage::storage::{EventStore, PostgresStorage, SqliteStorage, StorageError};

#[derive(Parser)]
#[command(name = "vantage-admin")]
#[command(about = "Vantage analytics admin CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an entity
    AddEntity {
        /// Entity ID
        id: String,
        /// Display label
        label: String,
    },
    /// Record a single event
    Record {
        /// Entity ID
        entity_id: String,
        /// Event kind (view, lead)
        kind: String,
        /// Lead status (PENDING, CONTACTED, CLOSED)
        #[arg(long)]
        status: Option<String>,
        /// Event weight (views default to 1)
        #[arg(long)]
        value: Option<f64>,
        /// RFC 3339 timestamp, defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Fill the store with deterministic demo data
    Seed {
        /// Number of entities to create
        #[arg(long, default_value_t = 12)]
        entities: usize,
        /// Days of history to generate
        #[arg(long, default_value_t = 90)]
        days: i64,
        /// RNG seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print the dashboard report as JSON
    Report {
        /// Anchor the report at this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

async fn seed(
    storage: &Arc<dyn EventStore>,
    now: DateTime<Utc>,
    entities: usize,
    days: i64,
    seed: u64,
) -> Result<(usize, usize)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let created_at = (now - Duration::days(days)).timestamp();

    let mut ids = Vec::with_capacity(entities);
    for i in 1..=entities {
        let id = format!("listing-{i:03}");
        match storage
            .create_entity(&id, &format!("Listing {i}"), created_at)
            .await
        {
            Ok(_) | Err(StorageError::Conflict) => ids.push(id),
            Err(e) => return Err(e.into()),
        }
    }
    if ids.is_empty() {
        return Ok((0, 0));
    }

    let mut views = 0;
    let mut leads = 0;
    for day in 0..days {
        let day_start = now - Duration::days(day);
        for id in &ids {
            let count = rng.random_range(0..25u32);
            if count == 0 {
                continue;
            }
            let offset = Duration::seconds(rng.random_range(0..86_400));
            storage
                .record_event(&NewEvent {
                    entity_id: id.clone(),
                    kind: EventKind::View,
                    category: None,
                    value: Some(f64::from(count)),
                    occurred_at: (day_start - offset).timestamp(),
                })
                .await?;
            views += 1;
        }

        for _ in 0..rng.random_range(0..4usize) {
            let id = &ids[rng.random_range(0..ids.len())];
            let statuses = LeadStatus::all();
            let status = statuses[rng.random_range(0..statuses.len())];
            let offset = Duration::seconds(rng.random_range(0..86_400));
            storage
                .record_event(&NewEvent {
                    entity_id: id.clone(),
                    kind: EventKind::Lead,
                    category: Some(status.as_str().to_string()),
                    value: None,
                    occurred_at: (day_start - offset).timestamp(),
                })
                .await?;
            leads += 1;
        }
    }

    Ok((views, leads))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn EventStore> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::AddEntity { id, label } => {
            match storage
                .create_entity(&id, &label, Utc::now().timestamp())
                .await
            {
                Ok(entity) => println!("✓ Created entity '{}' ({})", entity.id, entity.label),
                Err(StorageError::Conflict) => println!("⚠ Entity '{}' already exists", id),
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Record {
            entity_id,
            kind,
            status,
            value,
            at,
        } => {
            let kind = EventKind::parse(&kind)
                .with_context(|| format!("unknown event kind '{kind}', expected view or lead"))?;
            let (category, value) = match kind {
                EventKind::View => (status, Some(value.unwrap_or(1.0))),
                EventKind::Lead => {
                    let status = match status.as_deref() {
                        None => LeadStatus::Pending,
                        Some(raw) => match LeadStatus::parse(raw) {
                            Some(s) => s,
                            None => bail!("unknown lead status '{raw}'"),
                        },
                    };
                    (Some(status.as_str().to_string()), value)
                }
            };

            let id = storage
                .record_event(&NewEvent {
                    entity_id: entity_id.clone(),
                    kind,
                    category,
                    value,
                    occurred_at: at.unwrap_or_else(Utc::now).timestamp(),
                })
                .await?;
            println!("✓ Recorded {} #{} for '{}'", kind.as_str(), id, entity_id);
        }
        Commands::Seed {
            entities,
            days,
            seed: rng_seed,
        } => {
            let (views, leads) = seed(&storage, Utc::now(), entities, days.max(0), rng_seed).await?;
            println!(
                "✓ Seeded {} entities with {} view events and {} leads",
                entities, views, leads
            );
        }
        Commands::Report { at } => {
            let clock: Arc<dyn Clock> = match at {
                Some(instant) => Arc::new(FixedClock(instant)),
                None => Arc::new(SystemClock),
            };
            let service = AnalyticsService::new(Arc::clone(&storage), clock, config.report);
            let report = service.generate_report().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&ReportResponse::from(report))?
            );
        }
    }

    Ok(())
}
