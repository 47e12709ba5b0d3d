//! Schema Extractor
//!
//! Queries the catalog for every user-visible table and its columns, then
//! fetches a few example rows per table. A failed catalog query aborts the
//! extraction; a failed example-row fetch only skips that table's examples.

use crate::database::results::QueryResult;
use crate::database::schema::{Column, SchemaDescription, SchemaWarning, Table};
use crate::error::{Result, SqlChatError};
use sqlx::{postgres::PgPool, sqlite::SqlitePool, Row};
use std::time::Duration;
use tracing::{info, warn};

/// Quote an identifier for interpolation into SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn catalog_timeout(timeout: Duration) -> SqlChatError {
    SqlChatError::DbTimeout {
        operation: "catalog query".to_string(),
        timeout_ms: timeout.as_millis() as u64,
    }
}

fn record_sample_failure(description: &mut SchemaDescription, table: &str, message: String) {
    warn!(table, error = %message, "skipping example rows");
    description.warnings.push(SchemaWarning {
        table: table.to_string(),
        message,
    });
}

/// Extract a PostgreSQL schema
pub async fn index_postgresql(
    pool: &PgPool,
    schema_name: &str,
    sample_rows: u32,
    timeout: Duration,
) -> Result<SchemaDescription> {
    let mut description = SchemaDescription::new();

    let db_name_query = "SELECT current_database()::text";
    let db_row: Option<(String,)> =
        tokio::time::timeout(timeout, sqlx::query_as(db_name_query).fetch_optional(pool))
            .await
            .map_err(|_| catalog_timeout(timeout))?
            .map_err(|e| SqlChatError::db_query(db_name_query, e))?;
    if let Some((db_name,)) = db_row {
        description.database_name = Some(db_name);
    }
    description.schema_name = Some(schema_name.to_string());

    // Catalog identifiers are domain types; cast to text for decoding
    let columns_query = r#"
        SELECT
            c.table_name::text AS table_name,
            t.table_type::text AS table_type,
            c.column_name::text AS column_name,
            c.data_type::text AS data_type,
            c.is_nullable::text AS is_nullable,
            c.column_default::text AS column_default
        FROM information_schema.columns c
        JOIN information_schema.tables t
            ON t.table_schema = c.table_schema
            AND t.table_name = c.table_name
        WHERE c.table_schema = $1
        ORDER BY c.table_name, c.ordinal_position
    "#;

    let rows = tokio::time::timeout(
        timeout,
        sqlx::query(columns_query).bind(schema_name).fetch_all(pool),
    )
    .await
    .map_err(|_| catalog_timeout(timeout))?
    .map_err(|e| SqlChatError::db_query(columns_query, e))?;

    for row in rows {
        let get = |name: &str| -> Result<String> {
            row.try_get::<String, _>(name)
                .map_err(|e| SqlChatError::db_query(columns_query, e))
        };
        let table_name = get("table_name")?;
        let table_type = get("table_type")?;
        let is_nullable = get("is_nullable")?;

        let mut column = Column::new(get("column_name")?, get("data_type")?, is_nullable == "YES");
        column.default_value = row.try_get("column_default").ok().flatten();

        description
            .tables
            .entry(table_name.clone())
            .or_insert_with(|| {
                if table_type == "VIEW" {
                    Table::new_view(&table_name)
                } else {
                    Table::new(&table_name)
                }
            })
            .add_column(column);
    }

    if sample_rows > 0 {
        let names: Vec<String> = description.tables.keys().cloned().collect();
        for name in names {
            let sql = format!(
                "SELECT * FROM {}.{} LIMIT {}",
                quote_ident(schema_name),
                quote_ident(&name),
                sample_rows
            );
            // Text results, so every column type has a readable rendering
            let fetched = tokio::time::timeout(timeout, sqlx::raw_sql(&sql).fetch_all(pool)).await;

            match fetched {
                Ok(Ok(rows)) => {
                    if let Some(table) = description.tables.get_mut(&name) {
                        table.sample_rows = QueryResult::from_rows(&rows).rows;
                    }
                }
                Ok(Err(e)) => record_sample_failure(&mut description, &name, e.to_string()),
                Err(_) => record_sample_failure(
                    &mut description,
                    &name,
                    format!("timed out after {}ms", timeout.as_millis()),
                ),
            }
        }
    }

    info!(
        tables = description.tables.len(),
        warnings = description.warnings.len(),
        "PostgreSQL schema extracted"
    );
    Ok(description)
}

/// Extract a SQLite schema
pub async fn index_sqlite(
    pool: &SqlitePool,
    sample_rows: u32,
    timeout: Duration,
) -> Result<SchemaDescription> {
    let mut description = SchemaDescription::new();
    description.database_name = Some("main".to_string());

    let columns_query = r#"
        SELECT
            m.name AS table_name,
            m.type AS table_type,
            p.name AS column_name,
            p.type AS data_type,
            p."notnull" AS not_null,
            p.dflt_value AS column_default
        FROM sqlite_master m
        JOIN pragma_table_info(m.name) p
        WHERE m.type IN ('table', 'view')
            AND m.name NOT LIKE 'sqlite_%'
        ORDER BY m.name, p.cid
    "#;

    let rows = tokio::time::timeout(timeout, sqlx::query(columns_query).fetch_all(pool))
        .await
        .map_err(|_| catalog_timeout(timeout))?
        .map_err(|e| SqlChatError::db_query(columns_query, e))?;

    for row in rows {
        let table_name: String = row
            .try_get("table_name")
            .map_err(|e| SqlChatError::db_query(columns_query, e))?;
        let table_type: String = row
            .try_get("table_type")
            .map_err(|e| SqlChatError::db_query(columns_query, e))?;
        let column_name: String = row
            .try_get("column_name")
            .map_err(|e| SqlChatError::db_query(columns_query, e))?;
        // Columns declared without a type report an empty string
        let data_type: String = row
            .try_get::<Option<String>, _>("data_type")
            .ok()
            .flatten()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "ANY".to_string());
        let not_null: i64 = row.try_get("not_null").unwrap_or(0);

        let mut column = Column::new(column_name, data_type, not_null == 0);
        column.default_value = row.try_get("column_default").ok().flatten();

        description
            .tables
            .entry(table_name.clone())
            .or_insert_with(|| {
                if table_type == "view" {
                    Table::new_view(&table_name)
                } else {
                    Table::new(&table_name)
                }
            })
            .add_column(column);
    }

    if sample_rows > 0 {
        let names: Vec<String> = description.tables.keys().cloned().collect();
        for name in names {
            let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(&name), sample_rows);
            let fetched = tokio::time::timeout(
                timeout,
                sqlx::query(&sql).persistent(false).fetch_all(pool),
            )
            .await;

            match fetched {
                Ok(Ok(rows)) => {
                    if let Some(table) = description.tables.get_mut(&name) {
                        table.sample_rows = QueryResult::from_rows(&rows).rows;
                    }
                }
                Ok(Err(e)) => record_sample_failure(&mut description, &name, e.to_string()),
                Err(_) => record_sample_failure(
                    &mut description,
                    &name,
                    format!("timed out after {}ms", timeout.as_millis()),
                ),
            }
        }
    }

    info!(
        tables = description.tables.len(),
        warnings = description.warnings.len(),
        "SQLite schema extracted"
    );
    Ok(description)
}
