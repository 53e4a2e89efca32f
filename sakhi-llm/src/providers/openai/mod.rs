//! OpenAI embedding provider

mod embedding;
mod types;

pub use embedding::OpenAIEmbeddingProvider;
