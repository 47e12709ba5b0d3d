//! Query results
//!
//! Holds the rows returned by an executed statement and renders them, either
//! as a boxed table for the terminal or as a compact plain table that is fed
//! back to the model on the next turn.

use crate::database::values::RowValues;
use comfy_table::presets::{ASCII_MARKDOWN, UTF8_FULL};
use comfy_table::{ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Rows sent back to the model per statement
pub const MAX_FEEDBACK_ROWS: usize = 20;

/// Render a single cell
pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
}

/// Result of one executed statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names (empty when no rows came back)
    pub columns: Vec<String>,
    /// Rows, values in column order
    pub rows: Vec<Vec<JsonValue>>,
}

impl QueryResult {
    /// Build a result from fetched rows
    pub fn from_rows<R: RowValues>(rows: &[R]) -> Self {
        let columns = rows.first().map(|r| r.column_names()).unwrap_or_default();
        let rows = rows.iter().map(RowValues::values).collect();
        Self { columns, rows }
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows came back
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn build_table(&self, limit: usize) -> Table {
        let mut table = Table::new();
        table.set_header(self.columns.clone());
        for row in self.rows.iter().take(limit) {
            table.add_row(row.iter().map(format_value).collect::<Vec<_>>());
        }
        table
    }

    /// Boxed table for the terminal
    pub fn to_table(&self) -> String {
        if self.columns.is_empty() {
            return "(no rows)".to_string();
        }
        let mut table = self.build_table(self.rows.len());
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.to_string()
    }

    /// Compact table for the model, capped at `limit` rows
    pub fn to_plain(&self, limit: usize) -> String {
        if self.columns.is_empty() {
            return "(no rows)".to_string();
        }
        let mut table = self.build_table(limit);
        table.load_preset(ASCII_MARKDOWN);
        table.to_string()
    }
}
