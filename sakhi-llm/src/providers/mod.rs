//! LLM provider implementations
//!
//! Concrete implementations of the GenerationProvider and EmbeddingProvider
//! traits for hosted services.

pub mod groq;
pub mod openai;

pub use groq::{GroqClient, GroqGenerationProvider};
pub use openai::OpenAIEmbeddingProvider;

use sakhi_core::{LlmError, SakhiError};

/// Build a request-failed error for a provider.
pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> SakhiError {
    SakhiError::Llm(LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

/// Build a rate-limited error for a provider.
pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> SakhiError {
    SakhiError::Llm(LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    })
}

/// Build an invalid-response error for a provider.
pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> SakhiError {
    SakhiError::Llm(LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}
