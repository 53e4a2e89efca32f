//! Groq HTTP client with rate limiting
//!
//! Speaks the OpenAI-compatible chat/completions endpoint that Groq hosts,
//! with request pacing and SSE streaming support.

use super::types::{ApiError, ChatStreamChunk};
use crate::providers::{invalid_response, rate_limited, request_failed};
use crate::TextStream;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use sakhi_core::SakhiResult;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

const PROVIDER: &str = "groq";

/// Groq API client with rate limiting.
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: Arc<Semaphore>,
    last_request: Arc<AtomicU64>,
    min_request_interval_ms: u64,
    start_time: Instant,
}

impl GroqClient {
    /// Create a new Groq client.
    ///
    /// # Arguments
    /// * `api_key` - Groq API key
    /// * `requests_per_minute` - Maximum requests per minute
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        let permits = rpm as usize;
        let min_interval_ms = (60_000 / rpm as u64).max(10);

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            rate_limiter: Arc::new(Semaphore::new(permits)),
            last_request: Arc::new(AtomicU64::new(0)),
            min_request_interval_ms: min_interval_ms,
            start_time: Instant::now(),
        }
    }

    /// Override the base URL, e.g. for a local OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn pace(&self) -> SakhiResult<()> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("Rate limiter error: {}", e)))?;

        // Enforce minimum interval between requests
        let now_ms = self.start_time.elapsed().as_millis() as u64;
        let last_ms = self.last_request.load(Ordering::Relaxed);
        let elapsed = now_ms.saturating_sub(last_ms);

        if elapsed < self.min_request_interval_ms {
            let wait_ms = self.min_request_interval_ms - elapsed;
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }

        self.last_request.store(now_ms, Ordering::Relaxed);
        Ok(())
    }

    async fn post(&self, endpoint: &str, body: &impl Serialize) -> SakhiResult<reqwest::Response> {
        self.pace().await?;

        let url = format!("{}/{}", self.base_url, endpoint);
        self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))
    }

    async fn error_from_response(response: reqwest::Response) -> sakhi_core::SakhiError {
        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let error_msg = if let Ok(api_error) = serde_json::from_str::<ApiError>(&error_text) {
            api_error.error.message
        } else {
            error_text
        };
        tracing::warn!(status = status.as_u16(), message = %error_msg, "groq request failed");

        match status {
            StatusCode::TOO_MANY_REQUESTS => rate_limited(PROVIDER, retry_after_ms),
            _ => request_failed(PROVIDER, status.as_u16() as i32, error_msg),
        }
    }

    /// Make an API request with automatic rate limiting.
    pub async fn request<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Req,
    ) -> SakhiResult<Res> {
        let response = self.post(endpoint, &body).await?;

        if response.status().is_success() {
            response.json().await.map_err(|e| {
                invalid_response(PROVIDER, format!("Failed to parse response: {}", e))
            })
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    /// Make a streaming API request, yielding the text content of each SSE
    /// delta frame.
    pub async fn request_stream<Req: Serialize>(
        &self,
        endpoint: &str,
        body: Req,
    ) -> SakhiResult<TextStream> {
        let response = self.post(endpoint, &body).await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        // SSE frames can be split across network chunks, so carry a line
        // buffer between chunks and only parse complete lines.
        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|e| request_failed(PROVIDER, 0, format!("Stream read failed: {}", e)))
            })
            .scan(String::new(), |buffer, chunk| {
                let out: Vec<SakhiResult<String>> = match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        let (texts, rest) = drain_sse_lines(buffer);
                        *buffer = rest;
                        texts.into_iter().map(Ok).collect()
                    }
                    Err(e) => vec![Err(e)],
                };
                futures_util::future::ready(Some(futures_util::stream::iter(out)))
            })
            .flatten();

        Ok(stream.boxed())
    }
}

/// Pull all complete SSE lines out of `buffer`, returning the text deltas
/// they carry and the unconsumed remainder.
fn drain_sse_lines(buffer: &str) -> (Vec<String>, String) {
    let mut texts = Vec::new();
    let mut rest = buffer;

    while let Some(pos) = rest.find('\n') {
        let line = rest[..pos].trim_end_matches('\r');
        if let Some(text) = parse_sse_line(line) {
            texts.push(text);
        }
        rest = &rest[pos + 1..];
    }

    (texts, rest.to_string())
}

/// Extract the content delta from one SSE line, if it carries any.
fn parse_sse_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    let chunk: ChatStreamChunk = serde_json::from_str(data).ok()?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty())
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
        .map(|seconds| (seconds * 1000.0) as i64)
}

impl std::fmt::Debug for GroqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_line_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_line(line), Some("Hi".to_string()));
    }

    #[test]
    fn test_parse_sse_line_done_marker() {
        assert_eq!(parse_sse_line("data: [DONE]"), None);
    }

    #[test]
    fn test_parse_sse_line_ignores_non_data() {
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line(""), None);
    }

    #[test]
    fn test_parse_sse_line_empty_delta() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_sse_line(line), None);
    }

    #[test]
    fn test_drain_sse_lines_keeps_partial_tail() {
        let buffer = "data: {\"choices\":[{\"delta\":{\"content\":\"a\"},\"finish_reason\":null}]}\ndata: {\"choi";
        let (texts, rest) = drain_sse_lines(buffer);
        assert_eq!(texts, vec!["a".to_string()]);
        assert_eq!(rest, "data: {\"choi");
    }

    #[test]
    fn test_drain_sse_lines_multiple_frames() {
        let buffer = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"one \"},\"finish_reason\":null}]}\n",
            "\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"two\"},\"finish_reason\":null}]}\n",
            "data: [DONE]\n",
        );
        let (texts, rest) = drain_sse_lines(buffer);
        assert_eq!(texts, vec!["one ".to_string(), "two".to_string()]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_parse_retry_after_ms() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("retry-after", "2.5".parse().unwrap());
        assert_eq!(parse_retry_after_ms(&headers), Some(2500));

        let empty = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after_ms(&empty), None);
    }
}
