//! REPL implementation
//!
//! This module implements the interactive Read-Eval-Print Loop.

use crate::cli::commands::{self, format_error, Command, CommandType};
use crate::cli::completer::SchemaCompleter;
use crate::config::storage::{ensure_history_dir, history_file};
use crate::error::{Result, SqlChatError};
use crate::session::Session;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, Editor};
use std::path::PathBuf;
use tracing::{debug, warn};

const PROMPT: &str = "sql-chat> ";

/// Interactive prompt over a session
pub struct Repl {
    /// The rustyline editor
    editor: Editor<SchemaCompleter, DefaultHistory>,
    /// Whether the REPL should continue running
    running: bool,
    /// The conversation and its database connection
    session: Session,
    /// Where line history is kept
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(session: Session) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .auto_add_history(true)
            .build();

        let mut editor = Editor::<SchemaCompleter, DefaultHistory>::with_config(config)
            .map_err(|e| SqlChatError::Readline(format!("Failed to initialize editor: {}", e)))?;
        editor.set_helper(Some(SchemaCompleter::new(session.schema())));

        let history_path = history_file();
        if let Err(e) = editor.load_history(&history_path) {
            // First run has no history file yet
            debug!(path = %history_path.display(), error = %e, "no line history loaded");
        }

        Ok(Self {
            editor,
            running: true,
            session,
            history_path,
        })
    }

    /// Run the REPL loop until the operator quits
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        while self.running {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    match Command::parse(line) {
                        Ok(command) => self.handle_command(command).await,
                        Err(e) => println!("{}", format_error(&e)),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    self.running = false;
                }
                Err(err) => {
                    self.save_history();
                    return Err(SqlChatError::Readline(err.to_string()));
                }
            }
        }

        self.save_history();
        Ok(())
    }

    fn save_history(&mut self) {
        let saved = ensure_history_dir(&self.history_path)
            .and_then(|_| {
                self.editor
                    .save_history(&self.history_path)
                    .map_err(|e| SqlChatError::Readline(e.to_string()))
            });
        if let Err(e) = saved {
            warn!(path = %self.history_path.display(), error = %e, "could not save line history");
        }
    }

    fn print_welcome(&self) {
        let db = self.session.database();
        println!();
        println!("sql-chat v{}", env!("CARGO_PKG_VERSION"));
        println!("Connected to {} ({})", db.target(), db.backend());
        println!("{}", self.session.schema().format_summary());
        println!();
        println!("Ask me a question about this database, and I'll try to answer!");
        println!("Type /help for commands, q to quit.");
        println!();
    }

    /// Handle a command
    async fn handle_command(&mut self, command: Command) {
        if matches!(command.command_type, CommandType::Question { .. } | CommandType::Retry) {
            println!("Asking the model...");
        }

        match commands::handle_command(&command, &mut self.session).await {
            Ok(msg) => println!("{}", msg),
            Err(e) => println!("{}", format_error(&e)),
        }

        if command.command_type == CommandType::Quit {
            self.running = false;
        }
    }

    /// Give back the session, e.g. to close it
    pub fn into_session(self) -> Session {
        self.session
    }
}
