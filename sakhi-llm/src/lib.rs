//! Sakhi LLM - Provider Abstraction Layer
//!
//! Provider-agnostic traits for text generation and embeddings, the
//! generation-mode decoding profiles, and mock providers for testing.
//! HTTP provider implementations live under [`providers`].

pub mod providers;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use sakhi_core::{EmbeddingVector, SakhiResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub use providers::groq::GroqGenerationProvider;
pub use providers::openai::OpenAIEmbeddingProvider;

/// Stream of incremental text chunks from a generation call.
pub type TextStream = BoxStream<'static, SakhiResult<String>>;

// ============================================================================
// GENERATION MODE
// ============================================================================

/// Decoding profile for a generation call.
///
/// Structured mode is low-temperature for classification and extraction;
/// Conversational mode is free-text for persona replies. Quota tiers are
/// charged by the calling component, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationMode {
    /// Low-temperature, bounded output for JSON-shaped answers.
    Structured,
    /// Higher-temperature free text for persona responses.
    Conversational,
}

impl GenerationMode {
    /// Sampling temperature for this mode.
    pub fn temperature(&self) -> f32 {
        match self {
            Self::Structured => 0.2,
            Self::Conversational => 0.8,
        }
    }

    /// Output token budget for this mode.
    pub fn max_tokens(&self) -> i32 {
        match self {
            Self::Structured => 1024,
            Self::Conversational => 512,
        }
    }
}

// ============================================================================
// PROVIDER TRAITS
// ============================================================================

/// Trait for text generation providers.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a complete reply for the given instructions and user text.
    async fn generate(
        &self,
        instructions: &str,
        user_text: &str,
        mode: GenerationMode,
    ) -> SakhiResult<String>;

    /// Generate a reply as a stream of incremental text chunks.
    /// Chunk boundaries are arbitrary; concatenating all chunks yields the
    /// full reply.
    async fn generate_stream(
        &self,
        instructions: &str,
        user_text: &str,
        mode: GenerationMode,
    ) -> SakhiResult<TextStream>;
}

/// Trait for embedding providers.
/// Embeddings must be deterministic for identical input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> SakhiResult<EmbeddingVector>;

    /// Generate embeddings for multiple texts in a batch,
    /// in the same order as the input.
    async fn embed_batch(&self, texts: &[&str]) -> SakhiResult<Vec<EmbeddingVector>>;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Model identifier for this provider.
    fn model_id(&self) -> &str;
}

// ============================================================================
// MOCK PROVIDERS FOR TESTING
// ============================================================================

/// Mock generation provider with scripted replies and a call counter.
///
/// Replies are consumed front-to-back; once the script is exhausted the
/// default reply is returned. Scripted errors are returned as-is, which is
/// how degraded-path behavior gets exercised in tests.
pub struct MockGenerationProvider {
    script: Mutex<VecDeque<SakhiResult<String>>>,
    default_reply: String,
    calls: AtomicUsize,
}

impl MockGenerationProvider {
    /// Create a mock that always returns `default_reply`.
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: default_reply.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a scripted reply.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(reply.into()));
    }

    /// Queue a scripted failure.
    pub fn push_error(&self, error: sakhi_core::SakhiError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Total number of generate/generate_stream calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> SakhiResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.default_reply.clone()))
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn generate(
        &self,
        _instructions: &str,
        _user_text: &str,
        _mode: GenerationMode,
    ) -> SakhiResult<String> {
        self.next_reply()
    }

    async fn generate_stream(
        &self,
        _instructions: &str,
        _user_text: &str,
        _mode: GenerationMode,
    ) -> SakhiResult<TextStream> {
        let reply = self.next_reply()?;
        // Split on word boundaries so chunking behavior is exercised.
        let chunks: Vec<SakhiResult<String>> = reply
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

impl std::fmt::Debug for MockGenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGenerationProvider")
            .field("calls", &self.call_count())
            .finish()
    }
}

/// Mock embedding provider for testing.
/// Generates deterministic embeddings based on text content.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    model_id: String,
    dimensions: usize,
}

impl MockEmbeddingProvider {
    /// Create a new mock embedding provider.
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
        }
    }

    /// Generate a deterministic embedding from text.
    /// Uses a simple byte-accumulation approach for reproducibility.
    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut data = vec![0.0f32; self.dimensions];

        for (i, byte) in text.bytes().enumerate() {
            let idx = i % self.dimensions;
            data[idx] += (byte as f32) / 255.0;
        }

        // Normalize to unit vector
        let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut data {
                *x /= norm;
            }
        }

        data
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> SakhiResult<EmbeddingVector> {
        Ok(EmbeddingVector::new(self.generate_embedding(text)))
    }

    async fn embed_batch(&self, texts: &[&str]) -> SakhiResult<Vec<EmbeddingVector>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
