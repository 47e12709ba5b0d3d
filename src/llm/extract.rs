//! SQL extraction from model replies
//!
//! Replies normally wrap statements in fenced code blocks. A reply without
//! fences is taken whole only when it already reads as SQL; anything else is
//! the model talking back to the operator.

use std::fmt;

/// Words a bare reply must start with to be treated as SQL
const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "EXPLAIN", "SHOW", "VALUES", "TABLE", "INSERT", "UPDATE", "DELETE",
    "CREATE", "ALTER", "DROP", "TRUNCATE", "PRAGMA",
];

/// Why no SQL could be taken from a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The reply was empty or whitespace
    EmptyResponse,
    /// The reply is prose with no code block
    NoSql,
    /// A code block was opened but never closed
    UnterminatedFence,
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::EmptyResponse => write!(f, "response was empty"),
            ExtractError::NoSql => write!(f, "response contains no SQL"),
            ExtractError::UnterminatedFence => write!(f, "code block is not closed"),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract the SQL statements from a model reply, in order
pub fn extract_sql(text: &str) -> Result<Vec<String>, ExtractError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::EmptyResponse);
    }

    if text.contains("```") {
        return extract_fenced(text);
    }

    if starts_with_keyword(text) {
        return Ok(vec![text.to_string()]);
    }

    Err(ExtractError::NoSql)
}

fn extract_fenced(text: &str) -> Result<Vec<String>, ExtractError> {
    let mut statements = Vec::new();
    let mut block: Option<Vec<&str>> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("```") {
            match block.take() {
                Some(lines) => {
                    let body = lines.join("\n").trim().to_string();
                    if !body.is_empty() {
                        statements.push(body);
                    }
                }
                None => {
                    // `rest` is the language tag; a one-line block keeps its body
                    let inline = rest.trim();
                    if let Some(body) = inline.strip_suffix("```") {
                        let body = strip_language_tag(body).trim();
                        if !body.is_empty() {
                            statements.push(body.to_string());
                        }
                    } else {
                        block = Some(Vec::new());
                    }
                }
            }
        } else if let Some(lines) = block.as_mut() {
            lines.push(line);
        }
    }

    if block.is_some() {
        return Err(ExtractError::UnterminatedFence);
    }
    if statements.is_empty() {
        return Err(ExtractError::NoSql);
    }
    Ok(statements)
}

fn strip_language_tag(body: &str) -> &str {
    let trimmed = body.trim_start();
    match trimmed.split_once(char::is_whitespace) {
        Some((tag, rest)) if tag.eq_ignore_ascii_case("sql") => rest,
        _ => trimmed,
    }
}

fn starts_with_keyword(text: &str) -> bool {
    let first = text
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .next()
        .unwrap_or_default();
    SQL_KEYWORDS.iter().any(|kw| first.eq_ignore_ascii_case(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_with_language_tag() {
        let reply = "Here you go:\n\n```sql\nSELECT name\nFROM users\nLIMIT 1;\n```\n\n\
                     This returns one user.";
        assert_eq!(
            extract_sql(reply).unwrap(),
            vec!["SELECT name\nFROM users\nLIMIT 1;".to_string()]
        );
    }

    #[test]
    fn test_multiple_blocks_keep_order() {
        let reply = "First:\n```\nSELECT 1;\n```\nthen:\n```postgresql\nSELECT 2;\n```";
        assert_eq!(
            extract_sql(reply).unwrap(),
            vec!["SELECT 1;".to_string(), "SELECT 2;".to_string()]
        );
    }

    #[test]
    fn test_language_tag_does_not_eat_identifiers() {
        // Column names containing "sql" survive extraction
        let reply = "```sql\nSELECT mysql_version FROM tools;\n```";
        assert_eq!(
            extract_sql(reply).unwrap(),
            vec!["SELECT mysql_version FROM tools;".to_string()]
        );
    }

    #[test]
    fn test_inline_fence() {
        assert_eq!(
            extract_sql("Try ```sql SELECT 1```").unwrap_err(),
            ExtractError::NoSql
        );
        assert_eq!(
            extract_sql("```sql SELECT 1```").unwrap(),
            vec!["SELECT 1".to_string()]
        );
    }

    #[test]
    fn test_bare_sql_reply() {
        assert_eq!(
            extract_sql("  select count(*) from orders;  ").unwrap(),
            vec!["select count(*) from orders;".to_string()]
        );
        assert_eq!(
            extract_sql("WITH t AS (SELECT 1) SELECT * FROM t").unwrap().len(),
            1
        );
    }

    #[test]
    fn test_conversational_reply() {
        assert_eq!(
            extract_sql("Which year are you interested in?").unwrap_err(),
            ExtractError::NoSql
        );
        assert_eq!(
            extract_sql("Selecting the right table depends on the year.").unwrap_err(),
            ExtractError::NoSql
        );
    }

    #[test]
    fn test_empty_and_unterminated() {
        assert_eq!(extract_sql("   ").unwrap_err(), ExtractError::EmptyResponse);
        assert_eq!(
            extract_sql("```sql\nSELECT 1;").unwrap_err(),
            ExtractError::UnterminatedFence
        );
        assert_eq!(extract_sql("```\n\n```").unwrap_err(), ExtractError::NoSql);
    }
}
