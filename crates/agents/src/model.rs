use async_trait::async_trait;

use crate::Result;

/// Chat message sent to the provider. Only the roles this service uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    System { content: String },
    User { content: String },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// OpenAI Chat Completions message object.
    #[must_use]
    pub fn to_openai_value(&self) -> serde_json::Value {
        match self {
            ChatMessage::System { content } => {
                serde_json::json!({ "role": "system", "content": content })
            },
            ChatMessage::User { content } => {
                serde_json::json!({ "role": "user", "content": content })
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: Usage,
}

/// Text completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Model identifier (e.g. "meta-llama/llama-3.1-8b-instruct:free").
    fn id(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse>;
}
