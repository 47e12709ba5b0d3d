//! Prompt composition
//!
//! The conversation sent to the model is rebuilt on every question from the
//! schema block and the recent turns, so trimming history never leaves a
//! dangling reference to a result the model cannot see.

use crate::database::results::MAX_FEEDBACK_ROWS;
use crate::database::DatabaseBackend;
use crate::llm::Message;
use crate::session::Turn;

/// Build the system message for a backend
pub fn system_prompt(backend: DatabaseBackend) -> String {
    format!(
        "You are a helpful database analyst who writes {} SQL queries to answer \
         questions about a database. Put every query in its own ```sql code block.",
        backend.name()
    )
}

/// Opening user message: the schema and how we will work together
pub fn introduction(schema_text: &str, question: &str) -> String {
    format!(
        "Hello, I have a database with the following schema:\n\n{}\n\n\
         I'd like to work with you to answer a question I have. I will run the \
         queries you write and tell you the results along the way. Please use as \
         few queries as possible, using joins where you can. If you're not sure \
         what to do, ask me about the database or run an intermediate query to \
         learn more about the data.\n\n\
         The question I have is:\n\n\"{}\"",
        schema_text.trim_end(),
        question
    )
}

/// Feedback describing what happened when a turn's SQL ran
pub fn result_summary(turn: &Turn) -> String {
    let mut summary = String::new();
    for query in &turn.executed {
        summary.push_str(&format!(
            "\nI ran `{}` and it returned {} rows. Here are the first few rows:\n{}\n",
            query.sql,
            query.result.row_count(),
            query.result.to_plain(MAX_FEEDBACK_ROWS)
        ));
    }
    if let Some(failure) = &turn.failure {
        summary.push_str(&format!(
            "\nRunning `{}` failed with an error: {}\n",
            failure.sql, failure.message
        ));
    }
    summary
}

fn follow_up(question: &str, previous: Option<&Turn>) -> String {
    match previous.map(result_summary) {
        Some(summary) if !summary.is_empty() => format!("{}\n{}", question, summary),
        _ => question.to_string(),
    }
}

/// Compose the full message list for a new question
///
/// `turns` is the window of history to include, oldest first.
pub fn build_messages(
    backend: DatabaseBackend,
    schema_text: &str,
    turns: &[Turn],
    question: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(turns.len() * 2 + 2);
    messages.push(Message::system(system_prompt(backend)));

    let mut previous: Option<&Turn> = None;
    for (i, turn) in turns.iter().enumerate() {
        let content = follow_up(&turn.question, previous);
        if i == 0 {
            messages.push(Message::user(introduction(schema_text, &content)));
        } else {
            messages.push(Message::user(content));
        }
        messages.push(Message::assistant(turn.response.clone()));
        previous = Some(turn);
    }

    let content = follow_up(question, previous);
    if turns.is_empty() {
        messages.push(Message::user(introduction(schema_text, &content)));
    } else {
        messages.push(Message::user(content));
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::QueryResult;
    use crate::llm::MessageRole;
    use crate::session::{ExecutedQuery, StatementFailure};
    use serde_json::json;

    fn turn(question: &str, response: &str) -> Turn {
        Turn {
            question: question.to_string(),
            response: response.to_string(),
            executed: Vec::new(),
            failure: None,
        }
    }

    #[test]
    fn test_first_question_embeds_schema() {
        let messages = build_messages(
            DatabaseBackend::PostgreSQL,
            "Table users:\n  id integer NOT NULL",
            &[],
            "How many users?",
        );

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("PostgreSQL"));
        assert_eq!(messages[1].role, MessageRole::User);
        assert!(messages[1].content.contains("Table users:"));
        assert!(messages[1].content.contains("\"How many users?\""));
    }

    #[test]
    fn test_follow_up_carries_previous_results() {
        let mut first = turn("How many users?", "```sql\nSELECT count(*) AS n FROM users;\n```");
        first.executed.push(ExecutedQuery {
            sql: "SELECT count(*) AS n FROM users;".to_string(),
            result: QueryResult {
                columns: vec!["n".to_string()],
                rows: vec![vec![json!(42)]],
            },
        });

        let messages = build_messages(DatabaseBackend::SQLite, "schema", &[first], "And orders?");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].role, MessageRole::Assistant);
        let last = &messages[3].content;
        assert!(last.starts_with("And orders?"));
        assert!(last.contains("it returned 1 rows"));
        assert!(last.contains("42"));
        // Schema is only sent once
        assert!(!last.contains("Hello, I have a database"));
    }

    #[test]
    fn test_failure_is_reported_back() {
        let mut first = turn("q", "```sql\nSELECT nope FROM users;\n```");
        first.failure = Some(StatementFailure {
            sql: "SELECT nope FROM users;".to_string(),
            message: "no such column: nope".to_string(),
        });

        let summary = result_summary(&first);
        assert!(summary.contains("failed with an error: no such column: nope"));
    }

    #[test]
    fn test_conversational_turn_adds_nothing() {
        let first = turn("q", "Which year?");
        let messages = build_messages(DatabaseBackend::SQLite, "schema", &[first], "2021");
        assert_eq!(messages[3].content, "2021");
    }
}
