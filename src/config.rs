//! Configuration for bookings-sync
//!
//! All settings come from environment variables (optionally seeded from a
//! `.env` file by the binary). The configuration is resolved once at
//! startup and is immutable afterwards.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SyncError};

/// Default number of rows per delivery batch
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Default number of rows fetched from the database per chunk
pub const DEFAULT_FETCH_SIZE: usize = 1000;

/// Default watermark file path
pub const DEFAULT_WATERMARK_FILE: &str = "last_sync.txt";

/// MySQL connection settings
#[derive(Clone)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

/// Ingestion endpoint settings
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL of the ingestion app; the webhook path is appended to this
    pub base_url: String,
    /// Shared secret sent as `X-Api-Key`
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Maximum delivery attempts per batch
    pub retry_attempts: u32,
    /// Base unit for exponential backoff between attempts
    pub backoff_base: Duration,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("timeout", &self.timeout)
            .field("retry_attempts", &self.retry_attempts)
            .field("backoff_base", &self.backoff_base)
            .finish()
    }
}

/// Full sync configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub mysql: MySqlConfig,
    pub api: ApiConfig,
    /// Rows per delivery batch
    pub batch_size: usize,
    /// Rows per database fetch chunk
    pub fetch_size: usize,
    /// Hard lower bound on `job_created`, `YYYY-MM-DD`
    pub floor_date: String,
    /// Watermark file location
    pub watermark_path: PathBuf,
}

impl SyncConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mysql = MySqlConfig {
            host: required(&get, "MYSQL_HOST")?,
            port: parse_or(&get, "MYSQL_PORT", 3306)?,
            user: required(&get, "MYSQL_USER")?,
            password: required(&get, "MYSQL_PASSWORD")?,
            database: required(&get, "MYSQL_DATABASE")?,
        };

        let api = ApiConfig {
            base_url: required(&get, "APP_URL")?,
            api_key: required(&get, "BOOKINGS_SYNC_API_KEY")?,
            timeout: Duration::from_secs(parse_or(&get, "SYNC_TIMEOUT_SECS", 30u64)?),
            retry_attempts: parse_or(&get, "SYNC_RETRY_ATTEMPTS", 3u32)?,
            backoff_base: Duration::from_secs(1),
        };
        if api.retry_attempts == 0 {
            return Err(SyncError::config("SYNC_RETRY_ATTEMPTS must be at least 1"));
        }

        let batch_size = parse_or(&get, "SYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(SyncError::config("SYNC_BATCH_SIZE must be at least 1"));
        }
        let fetch_size = parse_or(&get, "SYNC_FETCH_SIZE", DEFAULT_FETCH_SIZE)?;
        if fetch_size == 0 {
            return Err(SyncError::config("SYNC_FETCH_SIZE must be at least 1"));
        }

        Ok(Self {
            mysql,
            api,
            batch_size,
            fetch_size,
            floor_date: get("SYNC_FLOOR_DATE")
                .unwrap_or_else(|| crate::query::DEFAULT_FLOOR_DATE.to_string()),
            watermark_path: PathBuf::from(
                get("LAST_SYNC_FILE").unwrap_or_else(|| DEFAULT_WATERMARK_FILE.to_string()),
            ),
        })
    }
}

fn required(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    match get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SyncError::config(format!(
            "required environment variable {key} is not set"
        ))),
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SyncError::config(format!("invalid value for {key}: {raw:?}"))),
        None => Ok(default),
    }
}
