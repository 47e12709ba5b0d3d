//! Command handlers for CLI
//!
//! This module parses prompt input into commands and runs them against the
//! session. Anything that is not a `/` command is a question for the model.

use crate::database::QueryResult;
use crate::error::{Result, SqlChatError};
use crate::session::{ExecutedQuery, Session};

/// Command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandType {
    /// Show help message
    Help,
    /// Print the schema description
    Schema,
    /// List tables and views
    Tables,
    /// List the questions asked so far
    History,
    /// Forget the conversation
    Clear,
    /// Re-send the last failed question
    Retry,
    /// Run SQL typed by the operator
    Sql { statement: String },
    /// Exit the application
    Quit,
    /// Natural language question
    Question { text: String },
}

/// Parsed command
#[derive(Debug, Clone)]
pub struct Command {
    /// The type of command
    pub command_type: CommandType,
}

impl Command {
    /// Parse a command from user input
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.eq_ignore_ascii_case("q") {
            return Ok(Command {
                command_type: CommandType::Quit,
            });
        }

        if !input.starts_with('/') {
            return Ok(Command {
                command_type: CommandType::Question {
                    text: input.to_string(),
                },
            });
        }

        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (input, ""),
        };

        let command_type = match cmd {
            "/help" => CommandType::Help,
            "/schema" => CommandType::Schema,
            "/tables" => CommandType::Tables,
            "/history" => CommandType::History,
            "/clear" => CommandType::Clear,
            "/retry" => CommandType::Retry,
            "/sql" => {
                if rest.is_empty() {
                    return Err(SqlChatError::InvalidCommandSyntax {
                        command: cmd.to_string(),
                        expected: "/sql <statement>".to_string(),
                    });
                }
                CommandType::Sql {
                    statement: rest.to_string(),
                }
            }
            "/quit" | "/exit" => CommandType::Quit,
            _ => return Err(SqlChatError::UnknownCommand(cmd.to_string())),
        };

        Ok(Command { command_type })
    }
}

/// Render one executed statement for the terminal
pub fn format_result(result: &QueryResult) -> String {
    format!("Returned {} rows.\n{}", result.row_count(), result.to_table())
}

/// Render the model's reply followed by each statement's rows
pub fn format_answer(response: &str, executed: &[ExecutedQuery]) -> String {
    let mut out = format!("\nASSISTANT:\n\n{}\n", response.trim());
    for query in executed {
        out.push('\n');
        out.push_str(&format_result(&query.result));
        out.push('\n');
    }
    out
}

fn format_history(session: &Session) -> String {
    if session.history().is_empty() {
        return "No questions asked yet.".to_string();
    }
    let mut out = String::new();
    for (i, turn) in session.history().iter().enumerate() {
        out.push_str(&format!("{:>3}. {}\n", i + 1, turn.question));
        for query in &turn.executed {
            out.push_str(&format!(
                "       {} ({} rows)\n",
                query.sql.replace('\n', " "),
                query.result.row_count()
            ));
        }
        if let Some(failure) = &turn.failure {
            out.push_str(&format!(
                "       {} (failed: {})\n",
                failure.sql.replace('\n', " "),
                failure.message
            ));
        }
    }
    out.trim_end().to_string()
}

fn format_tables(session: &Session) -> String {
    let schema = session.schema();
    if schema.tables.is_empty() {
        return "No tables found.".to_string();
    }
    let mut out = format!("{}\n", schema.format_summary());
    for table in schema.tables.values() {
        out.push_str(&format!(
            "  {}{} ({} columns)\n",
            table.name,
            if table.is_view { " [view]" } else { "" },
            table.columns.len()
        ));
    }
    out.trim_end().to_string()
}

const HELP: &str = r#"
sql-chat commands

Ask a question in plain language and the assistant will write SQL, run it,
and show the results. Follow-up questions see the previous results.

Commands:
  /schema            Show tables, columns and example rows
  /tables            List tables and views
  /history           Show the questions asked so far
  /clear             Forget the conversation
  /retry             Re-send the last question that failed to reach the model
  /sql <statement>   Run SQL directly
  /help              Show this help message
  /quit, /exit, q    Exit

Press Tab to complete table and column names.
"#;

/// Handle a command and return the text to print
pub async fn handle_command(command: &Command, session: &mut Session) -> Result<String> {
    match &command.command_type {
        CommandType::Help => Ok(HELP.trim().to_string()),
        CommandType::Schema => Ok(session.schema().to_string()),
        CommandType::Tables => Ok(format_tables(session)),
        CommandType::History => Ok(format_history(session)),
        CommandType::Clear => {
            session.clear_history();
            Ok("Conversation cleared.".to_string())
        }
        CommandType::Retry => {
            let answer = session.retry().await?;
            Ok(format_answer(&answer.response, &answer.executed))
        }
        CommandType::Sql { statement } => {
            let executed = session.execute_sql(statement).await?;
            Ok(executed
                .iter()
                .map(|query| format_result(&query.result))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        CommandType::Quit => Ok("Goodbye!".to_string()),
        CommandType::Question { text } => {
            let recorded = session.history().len();
            match session.ask(text).await {
                Ok(answer) => Ok(format_answer(&answer.response, &answer.executed)),
                // The reply arrived but a statement failed: show both
                Err(e) => match session.history().get(recorded) {
                    Some(turn) => Ok(format!(
                        "{}\n{}",
                        format_answer(&turn.response, &turn.executed),
                        format_error(&e)
                    )),
                    None => Err(e),
                },
            }
        }
    }
}

/// Format an error for display
pub fn format_error(error: &SqlChatError) -> String {
    if error.is_retryable() {
        format!("Error: {}\nType /retry to send the question again.", error)
    } else {
        format!("Error: {}", error)
    }
}
