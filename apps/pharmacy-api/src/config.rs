//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use pharmacy_db::DbConfig;
use pharmacy_orders::CompensationPolicy;

/// Pharmacy API configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// HTTP server port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// First retry delay for compensation releases
    pub compensation_initial_backoff: Duration,

    /// Longest single retry delay
    pub compensation_max_backoff: Duration,

    /// Retry budget per release; `None` retries forever
    pub compensation_max_elapsed: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            http_port: 8080,
            database_path: PathBuf::from("./pharmacy.db"),
            db_max_connections: 5,
            compensation_initial_backoff: Duration::from_millis(50),
            compensation_max_backoff: Duration::from_millis(2000),
            compensation_max_elapsed: Some(Duration::from_secs(60)),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let max_elapsed_secs: u64 = parse_or(&lookup, "PHARMACY_COMPENSATION_MAX_ELAPSED_SECS", 60)?;

        Ok(ApiConfig {
            http_port: parse_or(&lookup, "PHARMACY_HTTP_PORT", defaults.http_port)?,

            database_path: lookup("PHARMACY_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            db_max_connections: parse_or(
                &lookup,
                "PHARMACY_DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            )?,

            compensation_initial_backoff: Duration::from_millis(parse_or(
                &lookup,
                "PHARMACY_COMPENSATION_INITIAL_BACKOFF_MS",
                50,
            )?),

            compensation_max_backoff: Duration::from_millis(parse_or(
                &lookup,
                "PHARMACY_COMPENSATION_MAX_BACKOFF_MS",
                2000,
            )?),

            // 0 = unbounded
            compensation_max_elapsed: match max_elapsed_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        })
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.db_max_connections)
    }

    pub fn compensation_policy(&self) -> CompensationPolicy {
        CompensationPolicy {
            initial_backoff: self.compensation_initial_backoff,
            max_backoff: self.compensation_max_backoff,
            max_elapsed: self.compensation_max_elapsed,
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
