//! Database module for handling the embedded SQLite store
//!
//! This module provides connection pooling, configuration, and health checks
//! for the single file-backed database kept per installation.

use crate::error::{DatabaseError, DatabaseResult};
use sqlx::{
    Pool, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{env, path::Path, str::FromStr, time::Duration};
use tracing::{error, info};

/// Default location of the database file, relative to the working directory
pub const DEFAULT_DATABASE_URL: &str = "sqlite://checknshare.db";

/// Database configuration struct
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database connection URL (`sqlite://path/to/file.db`)
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// How long a writer waits on a locked database, in seconds
    pub busy_timeout: u64,
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `DATABASE_URL`: SQLite connection URL (default: "sqlite://checknshare.db")
    /// - `DATABASE_MAX_CONNECTIONS`: Maximum number of connections (default: 4)
    /// - `DATABASE_BUSY_TIMEOUT`: Busy timeout in seconds (default: 5)
    pub fn from_env() -> DatabaseResult<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4);

        let busy_timeout = env::var("DATABASE_BUSY_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        if max_connections == 0 {
            return Err(DatabaseError::Configuration(
                "DATABASE_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            max_connections,
            busy_timeout,
        })
    }

    /// Configuration pointing at a database file on disk
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self {
            database_url: format!("sqlite://{}", path.as_ref().display()),
            max_connections: 4,
            busy_timeout: 5,
        }
    }
}

/// Initialize a SQLite connection pool
///
/// The database file is created when missing. Connections run in WAL mode
/// with foreign keys enabled.
///
/// # Arguments
///
/// * `config` - Database configuration
///
/// # Returns
///
/// * `DatabaseResult<Pool<Sqlite>>` - SQLite connection pool or error
pub async fn init_pool(config: &DatabaseConfig) -> DatabaseResult<Pool<Sqlite>> {
    info!("Initializing database connection pool");

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| DatabaseError::Configuration(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(config.busy_timeout));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(DatabaseError::Connection)?;

    info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// Check database connectivity
///
/// # Arguments
///
/// * `pool` - SQLite connection pool
///
/// # Returns
///
/// * `DatabaseResult<bool>` - True if the database answers, false otherwise
pub async fn health_check(pool: &SqlitePool) -> DatabaseResult<bool> {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => Ok(true),
        Err(e) => {
            error!("Database health check failed: {}", e);
            Ok(false)
        }
    }
}
