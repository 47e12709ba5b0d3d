//! Schema data structures
//!
//! This module defines the schema description built once after connecting:
//! tables, their columns, a few example rows each, and the text block
//! handed to the model as context.

use crate::database::results::format_value;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Represents a column in a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column data type as reported by the catalog
    pub data_type: String,
    /// Whether the column is nullable
    pub nullable: bool,
    /// Default value (if any)
    pub default_value: Option<String>,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default_value: None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        if self.nullable {
            write!(f, " NULL")?;
        } else {
            write!(f, " NOT NULL")?;
        }
        if let Some(ref default) = self.default_value {
            write!(f, " DEFAULT {}", default)?;
        }
        Ok(())
    }
}

/// Represents a database table or view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table or view name
    pub name: String,
    /// Whether this is a view (vs a table)
    pub is_view: bool,
    /// Table columns, in ordinal order
    pub columns: Vec<Column>,
    /// Example rows, values in column order
    pub sample_rows: Vec<Vec<JsonValue>>,
}

impl Table {
    /// Create a new table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_view: false,
            columns: Vec::new(),
            sample_rows: Vec::new(),
        }
    }

    /// Create a new view
    pub fn new_view(name: impl Into<String>) -> Self {
        let mut table = Self::new(name);
        table.is_view = true;
        table
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Column names in ordinal order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Format table schema for the model
    pub fn format_schema(&self) -> String {
        let prefix = if self.is_view { "View" } else { "Table" };
        let mut result = format!("{} {}:\n", prefix, self.name);

        for column in &self.columns {
            result.push_str(&format!("  {}\n", column));
        }

        if self.sample_rows.is_empty() {
            result.push_str("  Example rows: none\n");
        } else {
            result.push_str(&format!("  Example rows ({}):\n", self.sample_rows.len()));
            result.push_str(&format!("    {}\n", self.column_names().join(" | ")));
            for row in &self.sample_rows {
                let values: Vec<String> = row.iter().map(format_value).collect();
                result.push_str(&format!("    {}\n", values.join(" | ")));
            }
        }

        result
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_schema())
    }
}

/// A table whose example rows could not be fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaWarning {
    /// Table the failure belongs to
    pub table: String,
    /// Database error text
    pub message: String,
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipped example rows for {}: {}", self.table, self.message)
    }
}

/// Complete schema description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescription {
    /// Database name (if available)
    pub database_name: Option<String>,
    /// Schema/namespace name (e.g., "public")
    pub schema_name: Option<String>,
    /// Tables and views indexed by name
    pub tables: BTreeMap<String, Table>,
    /// Per-table extraction failures
    pub warnings: Vec<SchemaWarning>,
    /// Extraction timestamp
    pub indexed_at: chrono::DateTime<chrono::Utc>,
}

impl SchemaDescription {
    /// Create a new, empty schema description
    pub fn new() -> Self {
        Self {
            database_name: None,
            schema_name: None,
            tables: BTreeMap::new(),
            warnings: Vec::new(),
            indexed_at: chrono::Utc::now(),
        }
    }

    /// Add a table to the description
    pub fn add_table(&mut self, table: Table) {
        let name = table.name.clone();
        self.tables.insert(name, table);
    }

    /// Get a table by name
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Get all table names
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|k| k.as_str()).collect()
    }

    /// Distinct table and column names, for completion
    pub fn identifiers(&self) -> Vec<String> {
        let mut words: Vec<String> = Vec::new();
        for table in self.tables.values() {
            words.push(table.name.clone());
            for column in &table.columns {
                words.push(column.name.clone());
            }
        }
        words.sort();
        words.dedup();
        words
    }

    /// Format the entire schema for LLM context
    pub fn format_for_llm(&self) -> String {
        let mut result = String::new();

        if let Some(ref db_name) = self.database_name {
            result.push_str(&format!("Database: {}\n", db_name));
        }
        if let Some(ref schema) = self.schema_name {
            result.push_str(&format!("Schema: {}\n", schema));
        }
        if !result.is_empty() {
            result.push('\n');
        }

        let tables: Vec<String> = self.tables.values().map(Table::format_schema).collect();
        result.push_str(&tables.join("\n"));

        result
    }

    /// One-line summary of the tables, shown after connecting
    pub fn format_summary(&self) -> String {
        let table_count = self.tables.values().filter(|t| !t.is_view).count();
        let view_count = self.tables.values().filter(|t| t.is_view).count();
        format!(
            "{} tables and {} views: {}",
            table_count,
            view_count,
            self.table_names().join(", ")
        )
    }
}

impl Default for SchemaDescription {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchemaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_for_llm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users_table() -> Table {
        let mut table = Table::new("users");
        table.add_column(Column::new("id", "integer", false));
        table.add_column(Column::new("name", "text", true));
        table.sample_rows = vec![vec![json!(1), json!("Alice")], vec![json!(2), JsonValue::Null]];
        table
    }

    #[test]
    fn test_column_display() {
        let mut column = Column::new("created_at", "timestamp", false);
        column.default_value = Some("now()".to_string());
        assert_eq!(column.to_string(), "created_at timestamp NOT NULL DEFAULT now()");
        assert_eq!(Column::new("name", "text", true).to_string(), "name text NULL");
    }

    #[test]
    fn test_table_creation() {
        let table = Table::new("users");
        assert_eq!(table.name, "users");
        assert!(!table.is_view);
        assert!(table.columns.is_empty());
        assert!(Table::new_view("active_users").is_view);
    }

    #[test]
    fn test_table_format_includes_examples() {
        let formatted = users_table().format_schema();
        assert!(formatted.starts_with("Table users:\n"));
        assert!(formatted.contains("  id integer NOT NULL\n"));
        assert!(formatted.contains("Example rows (2):"));
        assert!(formatted.contains("    id | name\n"));
        assert!(formatted.contains("    1 | Alice\n"));
        assert!(formatted.contains("    2 | NULL\n"));
    }

    #[test]
    fn test_llm_formatting() {
        let mut description = SchemaDescription::new();
        description.database_name = Some("test_db".to_string());
        description.add_table(users_table());
        description.add_table(Table::new_view("recent_users"));

        let formatted = description.format_for_llm();
        assert!(formatted.contains("Database: test_db"));
        assert!(formatted.contains("Table users:"));
        assert!(formatted.contains("View recent_users:"));
        assert!(formatted.contains("Example rows: none"));
        assert_eq!(description.format_summary(), "1 tables and 1 views: recent_users, users");
    }

    #[test]
    fn test_identifiers_are_deduplicated() {
        let mut description = SchemaDescription::new();
        description.add_table(users_table());
        let mut orders = Table::new("orders");
        orders.add_column(Column::new("id", "integer", false));
        orders.add_column(Column::new("user_id", "integer", true));
        description.add_table(orders);

        assert_eq!(
            description.identifiers(),
            vec!["id", "name", "orders", "user_id", "users"]
        );
    }
}
