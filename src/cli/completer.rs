//! Tab completion for the prompt
//!
//! Completes slash commands at the start of the line and table or column
//! names anywhere else.

use crate::database::SchemaDescription;
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

/// Commands offered when the line starts with `/`
pub const COMMANDS: &[&str] = &[
    "/help", "/schema", "/tables", "/history", "/clear", "/retry", "/sql", "/quit", "/exit",
];

/// Completer over schema identifiers
pub struct SchemaCompleter {
    /// Sorted, de-duplicated table and column names
    words: Vec<String>,
}

impl SchemaCompleter {
    pub fn new(schema: &SchemaDescription) -> Self {
        Self::from_words(schema.identifiers())
    }

    pub fn from_words(mut words: Vec<String>) -> Self {
        words.sort();
        words.dedup();
        Self { words }
    }

    /// Identifiers starting with `prefix`, ignoring case
    pub fn candidates(&self, prefix: &str) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let prefix = prefix.to_lowercase();
        self.words
            .iter()
            .filter(|word| word.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn command_candidates(prefix: &str) -> Vec<String> {
        COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| cmd.to_string())
            .collect()
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte offset where the word ending at `pos` starts
fn word_start(line: &str, pos: usize) -> usize {
    line[..pos]
        .char_indices()
        .rev()
        .find(|(_, c)| !is_identifier_char(*c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0)
}

impl Completer for SchemaCompleter {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> std::result::Result<(usize, Vec<String>), ReadlineError> {
        let head = &line[..pos];
        if head.starts_with('/') && !head.contains(char::is_whitespace) {
            return Ok((0, Self::command_candidates(head)));
        }

        let start = word_start(line, pos);
        Ok((start, self.candidates(&line[start..pos])))
    }
}

impl Hinter for SchemaCompleter {
    type Hint = String;
}

impl Highlighter for SchemaCompleter {}

impl Validator for SchemaCompleter {}

impl Helper for SchemaCompleter {}
