//! Database Manager
//!
//! This module implements the DatabaseManager struct which owns the
//! connection, the extracted schema description, and statement execution.

use crate::config::Config;
use crate::database::connection::{ConnectSettings, DatabaseBackend, DatabasePool};
use crate::database::indexer;
use crate::database::results::QueryResult;
use crate::database::schema::SchemaDescription;
use crate::error::{Result, SqlChatError};
use std::time::Duration;
use tracing::{debug, info};

/// SQLSTATE for a statement cancelled by `statement_timeout`
const QUERY_CANCELED: &str = "57014";

/// Database Manager
///
/// Holds the single connection for the session. Every call is bounded by
/// the configured database timeout.
pub struct DatabaseManager {
    /// Database connection pool
    pool: DatabasePool,
    /// Schema description (empty until `extract_schema`)
    schema: SchemaDescription,
    /// Connection target without credentials
    target: String,
    /// Per-call timeout
    timeout: Duration,
}

impl DatabaseManager {
    /// Connect using the configuration
    ///
    /// `databaseUrl` wins over `postgresConnection` when present. Unless
    /// `allowWrites` is set the connection itself is opened read-only.
    pub async fn connect(config: &Config) -> Result<Self> {
        let settings = ConnectSettings::from(config);
        let target = config.database_target();
        info!(target = %target, read_only = settings.read_only, "connecting to database");

        let pool = match &config.database_url {
            Some(url) => DatabasePool::from_url(url, settings).await?,
            None => DatabasePool::connect_postgres(&config.postgres_connection, settings).await?,
        };

        Ok(Self::from_pool(pool, target, settings.timeout))
    }

    /// Wrap an already open pool
    pub fn from_pool(pool: DatabasePool, target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pool,
            schema: SchemaDescription::new(),
            target: target.into(),
            timeout,
        }
    }

    /// Query the catalog and example rows, caching the result
    pub async fn extract_schema(
        &mut self,
        schema_name: &str,
        sample_rows: u32,
    ) -> Result<&SchemaDescription> {
        let description = match &self.pool {
            DatabasePool::Postgres(pool) => {
                indexer::index_postgresql(pool, schema_name, sample_rows, self.timeout).await?
            }
            DatabasePool::Sqlite(pool) => {
                indexer::index_sqlite(pool, sample_rows, self.timeout).await?
            }
        };
        self.schema = description;
        Ok(&self.schema)
    }

    /// Execute one statement and collect its rows
    ///
    /// PostgreSQL statements go through the simple query protocol so every
    /// column arrives as text and any type can be shown. The server also
    /// cancels the statement itself once `statement_timeout` passes.
    pub async fn execute(&self, sql: &str) -> Result<QueryResult> {
        debug!(sql, "executing statement");
        let timeout_err = || self.timeout_error();

        let result = match &self.pool {
            DatabasePool::Postgres(pool) => {
                let rows = tokio::time::timeout(self.timeout, sqlx::raw_sql(sql).fetch_all(pool))
                    .await
                    .map_err(|_| timeout_err())?
                    .map_err(|e| self.statement_error(sql, e))?;
                QueryResult::from_rows(&rows)
            }
            DatabasePool::Sqlite(pool) => {
                let rows = tokio::time::timeout(
                    self.timeout,
                    sqlx::query(sql).persistent(false).fetch_all(pool),
                )
                .await
                .map_err(|_| timeout_err())?
                .map_err(|e| self.statement_error(sql, e))?;
                QueryResult::from_rows(&rows)
            }
        };

        debug!(rows = result.row_count(), "statement finished");
        Ok(result)
    }

    fn timeout_error(&self) -> SqlChatError {
        SqlChatError::DbTimeout {
            operation: "statement".to_string(),
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }

    fn statement_error(&self, sql: &str, err: sqlx::Error) -> SqlChatError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(QUERY_CANCELED) {
                return self.timeout_error();
            }
        }
        SqlChatError::sql_execution(sql, &err)
    }

    /// The cached schema description
    pub fn schema(&self) -> &SchemaDescription {
        &self.schema
    }

    /// Get the database backend type
    pub fn backend(&self) -> DatabaseBackend {
        self.pool.backend()
    }

    /// Connection target without credentials
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Check the connection still answers
    pub async fn is_connected(&self) -> bool {
        !self.pool.is_closed() && self.pool.test_connection(&self.target).await.is_ok()
    }

    /// Release the connection
    pub async fn close(&self) {
        info!(target = %self.target, "closing database connection");
        self.pool.close().await;
    }
}
