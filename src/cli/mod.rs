//! CLI module
//!
//! This module provides the interactive prompt: command parsing, schema
//! completion and the REPL loop.

pub mod commands;
pub mod completer;
pub mod repl;

// Re-exports
pub use completer::SchemaCompleter;
pub use repl::Repl;
