//! sql-chat library
//!
//! This is the library interface for sql-chat.
//! The main binary is in src/main.rs.

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod llm;
pub mod session;
