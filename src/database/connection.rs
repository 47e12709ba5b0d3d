//! Database connection abstraction
//!
//! This module provides the database backend enum and the single-connection
//! pool the session runs on (PostgreSQL, or SQLite for local files).

use crate::config::{redact_url, Config, PostgresConnection};
use crate::error::{Result, SqlChatError};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    /// PostgreSQL
    PostgreSQL,
    /// SQLite
    SQLite,
}

impl DatabaseBackend {
    /// Parse database URL to determine backend
    pub fn from_url(url: &str) -> Result<Self> {
        let url_lower = url.to_lowercase();

        if url_lower.starts_with("postgres://") || url_lower.starts_with("postgresql://") {
            Ok(DatabaseBackend::PostgreSQL)
        } else if url_lower.starts_with("sqlite:")
            || url_lower.ends_with(".db")
            || url_lower.ends_with(".sqlite")
            || url_lower.ends_with(".sqlite3")
        {
            Ok(DatabaseBackend::SQLite)
        } else {
            Err(SqlChatError::Config(format!(
                "Unable to determine database type from URL: {}",
                redact_url(url)
            )))
        }
    }

    /// Get the name of this database backend
    pub fn name(&self) -> &str {
        match self {
            DatabaseBackend::PostgreSQL => "PostgreSQL",
            DatabaseBackend::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How the session's connection is opened
#[derive(Debug, Clone, Copy)]
pub struct ConnectSettings {
    /// Acquire timeout, and the server-side statement timeout on PostgreSQL
    pub timeout: Duration,
    /// Open the connection so the database itself refuses writes
    pub read_only: bool,
}

impl From<&Config> for ConnectSettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.db_timeout(),
            read_only: !config.allow_writes,
        }
    }
}

/// Session parameters sent with the PostgreSQL startup message
fn pg_session_options(settings: ConnectSettings) -> Vec<(&'static str, String)> {
    let mut params = vec![("statement_timeout", settings.timeout.as_millis().to_string())];
    if settings.read_only {
        params.push(("default_transaction_read_only", "on".to_string()));
    }
    params
}

async fn connect_pg(
    options: PgConnectOptions,
    target: &str,
    settings: ConnectSettings,
) -> Result<DatabasePool> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(settings.timeout)
        .connect_with(options.options(pg_session_options(settings)))
        .await
        .map_err(|e| SqlChatError::db_connection(target, e))?;
    Ok(DatabasePool::Postgres(pool))
}

/// Database connection pool wrapper
///
/// Pools are capped at one connection: the session issues one statement at
/// a time and an in-memory SQLite database lives only as long as its
/// connection.
#[derive(Clone)]
pub enum DatabasePool {
    /// SQLite pool
    Sqlite(SqlitePool),
    /// PostgreSQL pool
    Postgres(PgPool),
}

impl DatabasePool {
    /// Get the database backend for this pool
    pub fn backend(&self) -> DatabaseBackend {
        match self {
            DatabasePool::Sqlite(_) => DatabaseBackend::SQLite,
            DatabasePool::Postgres(_) => DatabaseBackend::PostgreSQL,
        }
    }

    /// Connect to PostgreSQL using the structured connection record
    pub async fn connect_postgres(
        conn: &PostgresConnection,
        settings: ConnectSettings,
    ) -> Result<Self> {
        let target = conn.display_target();
        let options = PgConnectOptions::new()
            .host(&conn.host)
            .port(conn.port)
            .database(&conn.database)
            .username(&conn.user)
            .password(&conn.password);

        let pool = connect_pg(options, &target, settings).await?;
        pool.test_connection(&target).await?;
        Ok(pool)
    }

    /// Create a pool from a connection URL
    pub async fn from_url(url: &str, settings: ConnectSettings) -> Result<Self> {
        let backend = DatabaseBackend::from_url(url)?;
        let target = redact_url(url);

        let pool = match backend {
            DatabaseBackend::SQLite => {
                // Bare file paths get the sqlite: scheme sqlx expects
                let db_url = if url.starts_with("sqlite:") {
                    url.to_string()
                } else {
                    format!("sqlite:{}", url)
                };

                let mut options = SqliteConnectOptions::from_str(&db_url)
                    .map_err(|e| SqlChatError::db_connection(&target, e))?;
                if settings.read_only {
                    options = options.read_only(true).create_if_missing(false);
                }

                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(settings.timeout)
                    .connect_with(options)
                    .await
                    .map_err(|e| SqlChatError::db_connection(&target, e))?;
                DatabasePool::Sqlite(pool)
            }
            DatabaseBackend::PostgreSQL => {
                let options = PgConnectOptions::from_str(url)
                    .map_err(|e| SqlChatError::db_connection(&target, e))?;
                connect_pg(options, &target, settings).await?
            }
        };

        pool.test_connection(&target).await?;
        Ok(pool)
    }

    /// Test the connection
    pub async fn test_connection(&self, target: &str) -> Result<()> {
        let result = match self {
            DatabasePool::Sqlite(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.map(|_| ()),
            DatabasePool::Postgres(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.map(|_| ()),
        };
        result
            .map(|_| ())
            .map_err(|e| SqlChatError::db_connection(target, e))
    }

    /// Close the pool, waiting for the connection to be released
    pub async fn close(&self) {
        match self {
            DatabasePool::Sqlite(pool) => pool.close().await,
            DatabasePool::Postgres(pool) => pool.close().await,
        }
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        match self {
            DatabasePool::Sqlite(pool) => pool.is_closed(),
            DatabasePool::Postgres(pool) => pool.is_closed(),
        }
    }
}
