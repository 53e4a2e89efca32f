//! Groq provider (OpenAI-compatible chat completions)

mod client;
mod generation;
mod types;

pub use client::GroqClient;
pub use generation::{
    GroqGenerationProvider, DEFAULT_CONVERSATIONAL_MODEL, DEFAULT_STRUCTURED_MODEL,
};
