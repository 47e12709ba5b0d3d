//! Query session
//!
//! A `Session` owns the database manager and the model provider for the
//! lifetime of the REPL. Each question rebuilds the prompt from the schema
//! and recent turns, calls the model, pulls SQL out of the reply and runs it.

pub mod prompt;

use crate::config::{Config, DEFAULT_HISTORY_TURNS};
use crate::database::guard::split_statements;
use crate::database::{DatabaseManager, QueryResult, SchemaDescription};
use crate::error::{Result, SqlChatError};
use crate::llm::{extract_sql, GenerationParams, LLMProvider, LLMResponse};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A statement that ran and the rows it returned
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedQuery {
    pub sql: String,
    pub result: QueryResult,
}

/// The statement that stopped a turn, with the database's message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementFailure {
    pub sql: String,
    pub message: String,
}

/// One question/answer exchange
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    /// What the operator asked
    pub question: String,
    /// The model's full reply
    pub response: String,
    /// Statements that ran, in order
    pub executed: Vec<ExecutedQuery>,
    /// The statement that failed, if any; later statements were skipped
    pub failure: Option<StatementFailure>,
}

/// What a successful question produced
#[derive(Debug, Clone)]
pub struct Answer {
    /// The model's reply text
    pub response: String,
    /// Statements that ran; empty for a conversational reply
    pub executed: Vec<ExecutedQuery>,
}

impl Answer {
    /// Whether the model answered without SQL
    pub fn is_conversational(&self) -> bool {
        self.executed.is_empty()
    }
}

/// Session behaviour taken from the configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Bound on each model call
    pub api_timeout: Duration,
    /// Turns included in each prompt
    pub history_turns: usize,
    /// Let generated SQL modify the database
    pub allow_writes: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            api_timeout: Duration::from_secs(60),
            history_turns: DEFAULT_HISTORY_TURNS,
            allow_writes: false,
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            api_timeout: config.api_timeout(),
            history_turns: config.history_turns,
            allow_writes: config.allow_writes,
        }
    }
}

/// Conversation with the model over one database connection
pub struct Session {
    db: DatabaseManager,
    provider: Box<dyn LLMProvider>,
    params: GenerationParams,
    settings: SessionSettings,
    /// Schema block rendered once for every prompt
    schema_text: String,
    history: Vec<Turn>,
    /// Question whose model call failed, kept for `retry`
    pending_question: Option<String>,
}

impl Session {
    /// Create a session over an already indexed database
    pub fn new(
        db: DatabaseManager,
        provider: Box<dyn LLMProvider>,
        settings: SessionSettings,
    ) -> Self {
        let schema_text = db.schema().format_for_llm();
        info!(
            provider = provider.provider_name(),
            model = provider.model(),
            allow_writes = settings.allow_writes,
            "session started"
        );
        Self {
            db,
            provider,
            params: GenerationParams::default(),
            settings,
            schema_text,
            history: Vec::new(),
            pending_question: None,
        }
    }

    /// Ask a question and run the SQL the model writes
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SqlChatError::NothingToDo("question is empty".to_string()));
        }

        self.pending_question = Some(question.to_string());
        let response = self.call_model(question).await?;
        self.pending_question = None;

        let blocks = match extract_sql(&response.content) {
            Ok(blocks) => blocks,
            Err(reason) => {
                debug!(%reason, "reply contains no runnable SQL");
                Vec::new()
            }
        };

        let mut turn = Turn {
            question: question.to_string(),
            response: response.content,
            executed: Vec::new(),
            failure: None,
        };

        let mut error = None;
        for block in &blocks {
            if let Err((sql, e)) = self.run_block(block, &mut turn.executed).await {
                warn!(sql = %sql, error = %e, "generated statement failed");
                let message = match &e {
                    SqlChatError::SqlExecution { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                turn.failure = Some(StatementFailure { sql, message });
                error = Some(e);
                break;
            }
        }

        let answer = Answer {
            response: turn.response.clone(),
            executed: turn.executed.clone(),
        };
        self.history.push(turn);

        match error {
            Some(e) => Err(e),
            None => Ok(answer),
        }
    }

    /// Re-send the question whose model call failed
    pub async fn retry(&mut self) -> Result<Answer> {
        let question = self
            .pending_question
            .clone()
            .ok_or_else(|| SqlChatError::NothingToDo("no failed question to retry".to_string()))?;
        info!(question = %question, "retrying question");
        self.ask(&question).await
    }

    /// Run operator-typed SQL through the same guard as generated SQL
    ///
    /// Several statements run in order; the first failure stops the rest.
    pub async fn execute_sql(&self, sql: &str) -> Result<Vec<ExecutedQuery>> {
        let statements = self.split(sql)?;
        if statements.is_empty() {
            return Err(SqlChatError::NothingToDo("no SQL given".to_string()));
        }

        let mut executed = Vec::with_capacity(statements.len());
        for sql in statements {
            let result = self.db.execute(&sql).await?;
            executed.push(ExecutedQuery { sql, result });
        }
        Ok(executed)
    }

    async fn call_model(&self, question: &str) -> Result<LLMResponse> {
        let messages = prompt::build_messages(
            self.db.backend(),
            &self.schema_text,
            self.recent_turns(),
            question,
        );
        debug!(messages = messages.len(), "sending prompt");

        let timeout = self.settings.api_timeout;
        let call = self.provider.generate(&messages, Some(&self.params));
        match tokio::time::timeout(timeout, call).await {
            Err(_) => Err(SqlChatError::ApiTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            Ok(Err(SqlChatError::Http(e))) => Err(SqlChatError::LlmApi {
                provider: self.provider.provider_name().to_string(),
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }),
            Ok(result) => result,
        }
    }

    fn split(&self, sql: &str) -> Result<Vec<String>> {
        split_statements(sql, self.db.backend(), !self.settings.allow_writes)
    }

    /// Run one extracted block; on failure, the statement (or the block,
    /// if it was rejected before running) and the error
    async fn run_block(
        &self,
        block: &str,
        executed: &mut Vec<ExecutedQuery>,
    ) -> std::result::Result<(), (String, SqlChatError)> {
        let statements = self.split(block).map_err(|e| (block.trim().to_string(), e))?;
        for sql in statements {
            match self.db.execute(&sql).await {
                Ok(result) => executed.push(ExecutedQuery { sql, result }),
                Err(e) => return Err((sql, e)),
            }
        }
        Ok(())
    }

    fn recent_turns(&self) -> &[Turn] {
        let start = self.history.len().saturating_sub(self.settings.history_turns);
        &self.history[start..]
    }

    /// Forget the conversation; the schema stays
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.pending_question = None;
    }

    /// Every turn so far, oldest first
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Question waiting for `retry`
    pub fn pending_question(&self) -> Option<&str> {
        self.pending_question.as_deref()
    }

    pub fn schema(&self) -> &SchemaDescription {
        self.db.schema()
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    /// Release the database connection
    pub async fn close(&self) {
        self.db.close().await;
    }
}
