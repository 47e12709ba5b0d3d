//! LLM integration module
//!
//! This module provides the provider abstraction, the OpenAI chat
//! completions implementation and SQL extraction from replies.

pub mod client;
pub mod extract;
pub mod provider;

// Provider implementations
pub mod providers {
    pub mod openai;
}

// Re-exports
pub use extract::{extract_sql, ExtractError};
pub use provider::{GenerationParams, LLMProvider, LLMResponse, Message, MessageRole};
pub use providers::openai::OpenAIProvider;
