//! Statement splitting and the read-only guard for generated SQL
//!
//! A reply's SQL block is parsed with sqlparser using the connected
//! backend's dialect and split into single statements, since a PostgreSQL
//! prepared statement accepts one command at a time. When writes are not
//! allowed every statement must be a query with no data-modifying part:
//! `WITH d AS (DELETE ... RETURNING ...) SELECT ...` and `SELECT ... INTO`
//! are rejected as well as plain writes. SQL the parser cannot read is
//! rejected too, because it cannot be checked.

use crate::database::connection::DatabaseBackend;
use crate::error::{Result, SqlChatError};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::{Dialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use tracing::debug;

fn dialect_for(backend: DatabaseBackend) -> Box<dyn Dialect> {
    match backend {
        DatabaseBackend::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseBackend::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Split a block of SQL into statements, checking each one when `read_only`
///
/// A block holding a single statement is returned as written. Several
/// statements are returned as sqlparser renders them, which is exactly
/// the text that was checked. With writes allowed, text the parser cannot
/// read is passed to the database unchanged as one statement.
pub fn split_statements(
    sql: &str,
    backend: DatabaseBackend,
    read_only: bool,
) -> Result<Vec<String>> {
    let dialect = dialect_for(backend);

    let statements = match Parser::parse_sql(dialect.as_ref(), sql) {
        Ok(statements) => statements,
        Err(e) if read_only => {
            return Err(SqlChatError::UnverifiableSql {
                sql: sql.trim().to_string(),
                message: e.to_string(),
            });
        }
        Err(e) => {
            debug!(error = %e, "sqlparser could not parse statement, running as written");
            let sql = sql.trim();
            return Ok(if sql.is_empty() {
                Vec::new()
            } else {
                vec![sql.to_string()]
            });
        }
    };

    if read_only {
        for statement in &statements {
            if let Some(kind) = write_in_statement(statement) {
                return Err(SqlChatError::ReadOnlyViolation {
                    statement: kind,
                    sql: statement.to_string(),
                });
            }
        }
    }

    Ok(match statements.len() {
        1 => vec![sql.trim().to_string()],
        _ => statements.iter().map(ToString::to_string).collect(),
    })
}

/// The kind of write a statement performs, if any
fn write_in_statement(statement: &Statement) -> Option<String> {
    match statement {
        Statement::Query(query) => write_in_query(query),
        other => Some(leading_keyword(&other.to_string())),
    }
}

fn write_in_query(query: &Query) -> Option<String> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            if let Some(kind) = write_in_query(&cte.query) {
                return Some(kind);
            }
        }
    }
    write_in_set_expr(&query.body)
}

fn write_in_set_expr(expr: &SetExpr) -> Option<String> {
    match expr {
        SetExpr::Select(select) => select.into.as_ref().map(|_| "SELECT INTO".to_string()),
        SetExpr::Query(query) => write_in_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            write_in_set_expr(left).or_else(|| write_in_set_expr(right))
        }
        SetExpr::Values(_) | SetExpr::Table(_) => None,
        // INSERT / UPDATE / DELETE bodies and anything newer
        other => Some(leading_keyword(&other.to_string())),
    }
}

/// First keyword of a rendered statement, upper-cased (e.g. "DELETE")
fn leading_keyword(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_uppercase()
}
