//! Error types for sql-chat
//!
//! This module defines the error types used throughout the application.
//! Only configuration and initial connection failures are fatal; every
//! per-turn failure is reported to the operator and the session continues.

use thiserror::Error;

/// Result type alias for sql-chat
pub type Result<T> = std::result::Result<T, SqlChatError>;

/// Main error type for sql-chat
#[derive(Error, Debug)]
pub enum SqlChatError {
    /// Configuration file missing, malformed or incomplete
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database unreachable or authentication failed
    #[error("Connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A catalog query failed while extracting the schema
    #[error("Schema extraction failed for query `{query}`: {message}")]
    SchemaQuery { query: String, message: String },

    /// A database call exceeded the configured timeout
    #[error("Database timeout: {operation} exceeded {timeout_ms}ms")]
    DbTimeout { operation: String, timeout_ms: u64 },

    /// Generated (or typed) SQL failed to execute
    #[error("SQL execution failed: {message}\n  while running: {sql}")]
    SqlExecution { sql: String, message: String },

    /// A statement was blocked by the read-only guard
    #[error(
        "Blocked {statement} statement: only read-only queries are allowed \
         (set allowWrites to permit writes)"
    )]
    ReadOnlyViolation { statement: String, sql: String },

    /// SQL the read-only guard could not parse
    #[error("Could not verify that the SQL is read-only: {message}\n  while checking: {sql}")]
    UnverifiableSql { sql: String, message: String },

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP-related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The completion endpoint answered with an error
    #[error("{provider} API error (status {status}): {message}")]
    LlmApi {
        provider: String,
        message: String,
        status: u16,
    },

    /// The completion endpoint did not answer in time
    #[error("Model API call timed out after {timeout_ms}ms")]
    ApiTimeout { timeout_ms: u64 },

    /// No API key configured for a provider
    #[error("No API key configured for {0}")]
    LlmApiKeyMissing(String),

    /// Line editor failure
    #[error("Input error: {0}")]
    Readline(String),

    /// Command parsing errors
    #[error("Invalid syntax for {command}. Expected: {expected}")]
    InvalidCommandSyntax { command: String, expected: String },

    /// Unknown slash command
    #[error("Unknown command: {0}. Type /help for available commands")]
    UnknownCommand(String),

    /// Nothing to act on (e.g. /retry with no failed question)
    #[error("{0}")]
    NothingToDo(String),
}

impl SqlChatError {
    /// Create a connection error for the given target
    pub fn db_connection(target: impl Into<String>, err: sqlx::Error) -> Self {
        Self::Connection {
            target: target.into(),
            message: err.to_string(),
        }
    }

    /// Create a catalog query error
    pub fn db_query(query: &str, err: sqlx::Error) -> Self {
        Self::SchemaQuery {
            query: query.split_whitespace().collect::<Vec<_>>().join(" "),
            message: err.to_string(),
        }
    }

    /// Create an execution error carrying the database's message
    pub fn sql_execution(sql: impl Into<String>, err: &sqlx::Error) -> Self {
        let message = match err {
            sqlx::Error::Database(db_err) => db_err.message().to_string(),
            other => other.to_string(),
        };
        Self::SqlExecution {
            sql: sql.into(),
            message,
        }
    }

    /// Whether the process cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Connection { .. })
    }

    /// Whether re-sending the same question may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LlmApi { .. } | Self::ApiTimeout { .. } | Self::Http(_)
        )
    }
}
