//! Groq generation provider implementation

use super::client::GroqClient;
use super::types::{ChatMessage, ChatRequest, ChatResponse};
use crate::providers::invalid_response;
use crate::{GenerationMode, GenerationProvider, TextStream};
use async_trait::async_trait;
use sakhi_core::{LlmError, SakhiError, SakhiResult};
use std::time::Duration;

/// Default model for structured (classification/extraction) calls.
pub const DEFAULT_STRUCTURED_MODEL: &str = "llama-3.3-70b-versatile";

/// Default model for conversational calls.
pub const DEFAULT_CONVERSATIONAL_MODEL: &str = "llama-3.1-8b-instant";

/// Groq generation provider.
///
/// Routes structured calls to the larger model and conversational calls to
/// the fast one; the caller picks via [`GenerationMode`].
pub struct GroqGenerationProvider {
    client: GroqClient,
    structured_model: String,
    conversational_model: String,
    timeout: Duration,
}

impl GroqGenerationProvider {
    /// Create a provider with the default model pair.
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32, timeout: Duration) -> Self {
        Self {
            client: GroqClient::new(api_key, requests_per_minute),
            structured_model: DEFAULT_STRUCTURED_MODEL.to_string(),
            conversational_model: DEFAULT_CONVERSATIONAL_MODEL.to_string(),
            timeout,
        }
    }

    /// Override the model used for a mode.
    pub fn with_model(mut self, mode: GenerationMode, model: impl Into<String>) -> Self {
        match mode {
            GenerationMode::Structured => self.structured_model = model.into(),
            GenerationMode::Conversational => self.conversational_model = model.into(),
        }
        self
    }

    fn model_for(&self, mode: GenerationMode) -> &str {
        match mode {
            GenerationMode::Structured => &self.structured_model,
            GenerationMode::Conversational => &self.conversational_model,
        }
    }

    fn build_request(
        &self,
        instructions: &str,
        user_text: &str,
        mode: GenerationMode,
        stream: bool,
    ) -> ChatRequest {
        ChatRequest {
            model: self.model_for(mode).to_string(),
            messages: vec![
                ChatMessage::system(instructions),
                ChatMessage::user(user_text),
            ],
            max_tokens: Some(mode.max_tokens()),
            temperature: Some(mode.temperature()),
            stream: stream.then_some(true),
        }
    }

    fn timeout_error(&self) -> SakhiError {
        let timeout_ms = self.timeout.as_millis() as u64;
        tracing::warn!(timeout_ms, "groq call timed out");
        SakhiError::Llm(LlmError::Timeout {
            provider: "groq".to_string(),
            timeout_ms,
        })
    }
}

#[async_trait]
impl GenerationProvider for GroqGenerationProvider {
    async fn generate(
        &self,
        instructions: &str,
        user_text: &str,
        mode: GenerationMode,
    ) -> SakhiResult<String> {
        let request = self.build_request(instructions, user_text, mode, false);

        let response: ChatResponse =
            tokio::time::timeout(self.timeout, self.client.request("chat/completions", request))
                .await
                .map_err(|_| self.timeout_error())??;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| invalid_response("groq", "No choices in response"))?;

        Ok(choice.message.content)
    }

    async fn generate_stream(
        &self,
        instructions: &str,
        user_text: &str,
        mode: GenerationMode,
    ) -> SakhiResult<TextStream> {
        let request = self.build_request(instructions, user_text, mode, true);

        // Timeout covers connection setup; chunk delivery is unbounded.
        tokio::time::timeout(
            self.timeout,
            self.client.request_stream("chat/completions", request),
        )
        .await
        .map_err(|_| self.timeout_error())?
    }
}

impl std::fmt::Debug for GroqGenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqGenerationProvider")
            .field("structured_model", &self.structured_model)
            .field("conversational_model", &self.conversational_model)
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
