use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub report: ReportConfig,
    /// Attach a permissive CORS layer to the API router
    pub cors_allow_any: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Shape of the dashboard report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Trailing days covered by the daily series (the series has one extra
    /// bucket for today)
    pub daily_window_days: u32,
    /// Trailing weeks covered by the weekly series
    pub weekly_window_weeks: u32,
    /// Size of the top-entities ranking
    pub top_entities: usize,
}

impl ReportConfig {
    pub const DEFAULT_DAILY_WINDOW_DAYS: u32 = 30;
    pub const DEFAULT_WEEKLY_WINDOW_WEEKS: u32 = 12;
    pub const DEFAULT_TOP_ENTITIES: usize = 5;

    const MAX_DAILY_WINDOW_DAYS: u32 = 366;
    const MAX_WEEKLY_WINDOW_WEEKS: u32 = 104;
    const MAX_TOP_ENTITIES: usize = 100;

    fn from_env() -> Self {
        Self {
            daily_window_days: env_in_range(
                "REPORT_DAILY_WINDOW_DAYS",
                1..=Self::MAX_DAILY_WINDOW_DAYS,
                Self::DEFAULT_DAILY_WINDOW_DAYS,
            ),
            weekly_window_weeks: env_in_range(
                "REPORT_WEEKLY_WINDOW_WEEKS",
                1..=Self::MAX_WEEKLY_WINDOW_WEEKS,
                Self::DEFAULT_WEEKLY_WINDOW_WEEKS,
            ),
            top_entities: env_in_range(
                "REPORT_TOP_ENTITIES",
                1..=Self::MAX_TOP_ENTITIES,
                Self::DEFAULT_TOP_ENTITIES,
            ),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            daily_window_days: Self::DEFAULT_DAILY_WINDOW_DAYS,
            weekly_window_weeks: Self::DEFAULT_WEEKLY_WINDOW_WEEKS,
            top_entities: Self::DEFAULT_TOP_ENTITIES,
        }
    }
}

/// Read a numeric variable, falling back to `default` when it is unset,
/// unparsable or outside `range`
fn env_in_range<T>(name: &str, range: std::ops::RangeInclusive<T>, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let Ok(raw) = std::env::var(name) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if range.contains(&value) => value,
        _ => {
            tracing::warn!(
                "Invalid {name} '{raw}', falling back to {default}. Expected {}..={}",
                range.start(),
                range.end()
            );
            default
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./vantage.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_allow_any = std::env::var("CORS_ALLOW_ANY")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            report: ReportConfig::from_env(),
            cors_allow_any,
        })
    }
}
