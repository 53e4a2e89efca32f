//! OpenAI embedding provider implementation
//!
//! Embedding traffic is low-volume (one call per user message, one per
//! stored fact), so this client skips request pacing and relies on a plain
//! per-request timeout.

use super::types::{ApiError, EmbeddingRequest, EmbeddingResponse};
use crate::providers::{invalid_response, rate_limited, request_failed};
use crate::EmbeddingProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use sakhi_core::{EmbeddingVector, SakhiResult};
use std::time::Duration;

const PROVIDER: &str = "openai";

/// OpenAI embedding provider using text-embedding-3-small or a custom model.
pub struct OpenAIEmbeddingProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a new OpenAI embedding provider.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            dimensions,
        }
    }

    /// Create a provider with the default text-embedding-3-small model.
    pub fn with_default_model(api_key: impl Into<String>) -> Self {
        Self::new(api_key, "text-embedding-3-small", 1536, Duration::from_secs(30))
    }

    /// Override the base URL, e.g. for a local OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request(&self, texts: &[&str]) -> SakhiResult<EmbeddingResponse> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.iter().map(|s| s.to_string()).collect(),
            dimensions: Some(self.dimensions),
        };

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                invalid_response(PROVIDER, format!("Failed to parse response: {}", e))
            });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ApiError>(&error_text)
            .map(|e| e.error.message)
            .unwrap_or(error_text);
        tracing::warn!(status = status.as_u16(), message = %message, "openai embedding request failed");

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => rate_limited(PROVIDER, 0),
            _ => request_failed(PROVIDER, status.as_u16() as i32, message),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> SakhiResult<EmbeddingVector> {
        let response = self.request(&[text]).await?;

        let data = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| invalid_response(PROVIDER, "No embedding data in response"))?;

        Ok(EmbeddingVector::new(data.embedding))
    }

    async fn embed_batch(&self, texts: &[&str]) -> SakhiResult<Vec<EmbeddingVector>> {
        let response = self.request(texts).await?;

        if response.data.len() != texts.len() {
            return Err(invalid_response(
                PROVIDER,
                format!(
                    "Expected {} embeddings but got {}",
                    texts.len(),
                    response.data.len()
                ),
            ));
        }

        // The API may reorder entries; restore input order via the index field.
        let mut ordered: Vec<_> = response.data;
        ordered.sort_by_key(|d| d.index);

        Ok(ordered
            .into_iter()
            .map(|d| EmbeddingVector::new(d.embedding))
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAIEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIEmbeddingProvider")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}
