//! AI completion provider: a single text-in / text-out call per message.
//!
//! No conversation history is carried; every request is the system prompt
//! plus the customer's message.

pub mod error;
pub mod model;
pub mod prompt;
pub mod providers;

pub use {
    error::{ProviderError, Result},
    model::{ChatMessage, CompletionResponse, LlmProvider, Usage},
    prompt::build_system_prompt,
    providers::openrouter::OpenRouterProvider,
};
