//! Database module
//!
//! This module provides the database connection, schema extraction,
//! statement execution and the read-only guard.

pub mod connection;
pub mod guard;
pub mod indexer;
pub mod manager;
pub mod results;
pub mod schema;
pub mod values;

// Re-exports
pub use connection::{ConnectSettings, DatabaseBackend, DatabasePool};
pub use manager::DatabaseManager;
pub use results::QueryResult;
pub use schema::{Column, SchemaDescription, SchemaWarning, Table};
