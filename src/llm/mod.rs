//! LLM provider abstraction
//!
//! The classifier and handlers talk to [`LlmClient`]; the Gemini client is
//! the only production implementation.

mod gemini;

use async_trait::async_trait;

use crate::Result;

pub use gemini::{GeminiClient, DEFAULT_BASE_URL};

/// A single-turn completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System instruction
    pub system: Option<String>,
    /// User prompt
    pub prompt: String,
    /// Ask the provider for a JSON response body
    pub json: bool,
    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    /// Plain-text request with a moderate temperature
    #[must_use]
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            json: false,
            temperature: 0.7,
        }
    }

    /// JSON request with a low temperature, for classification
    #[must_use]
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            json: true,
            temperature: 0.1,
        }
    }

    /// Attach a system instruction
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Text generation capability
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion and return its text
    ///
    /// # Errors
    ///
    /// Returns `Error::Llm` on transport or provider failure
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
