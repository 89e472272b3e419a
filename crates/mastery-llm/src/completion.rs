//! Completion contract for LLM backends

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token usage reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Prompt plus completion tokens
    #[must_use]
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Text produced by one LLM call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// Tokens consumed
    pub usage: TokenUsage,
}

/// Something that can run a prompt against a model
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmInvoker: Send + Sync {
    /// Run `prompt` on `model`
    async fn complete(&self, model: &str, prompt: &str) -> Result<Completion>;
}
