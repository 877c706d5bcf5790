//! Embedding service client.
//!
//! The CLIP-style model runs out of process. Images go up base64-encoded
//! and both endpoints answer with `{"embedding": [f32; 512]}`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reelcraft_models::EMBEDDING_DIM;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{IndexError, IndexResult};

/// Maps images and text into the same vector space.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_image(&self, image: &Path) -> IndexResult<Vec<f32>>;
    async fn embed_text(&self, text: &str) -> IndexResult<Vec<f32>>;
}

/// Configuration for the embedding client.
#[derive(Debug, Clone)]
pub struct EmbeddingClientConfig {
    /// Base URL of the embedding service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for EmbeddingClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 0,
        }
    }
}

impl EmbeddingClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("EMBEDDING_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("EMBEDDING_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_retries: std::env::var("EMBEDDING_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    image_base64: String,
}

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Client for the embedding HTTP service.
pub struct HttpEmbedder {
    http: Client,
    config: EmbeddingClientConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingClientConfig) -> IndexResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(IndexError::Network)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> IndexResult<Self> {
        Self::new(EmbeddingClientConfig::from_env())
    }

    async fn post<B: Serialize + Sync>(&self, endpoint: &str, body: &B) -> IndexResult<Vec<f32>> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        debug!("Sending embedding request to {}", url);

        let response = self
            .with_retry(|| async {
                let response = self.http.post(&url).json(body).send().await?;
                let status = response.status();
                if status.is_success() {
                    Ok(response)
                } else {
                    let text = response.text().await.unwrap_or_default();
                    Err(IndexError::from_http_status(status.as_u16(), text))
                }
            })
            .await?;

        let parsed: EmbeddingResponse = response.json().await?;
        check_dimension(parsed.embedding)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> IndexResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = IndexResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Embedding request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

fn check_dimension(embedding: Vec<f32>) -> IndexResult<Vec<f32>> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(IndexError::invalid_response(format!(
            "expected {} dimensions, got {}",
            EMBEDDING_DIM,
            embedding.len()
        )));
    }
    Ok(embedding)
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_image(&self, image: &Path) -> IndexResult<Vec<f32>> {
        let bytes = match tokio::fs::read(image).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::NotFound(image.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let request = ImageRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        };
        self.post("/embed/image", &request).await
    }

    async fn embed_text(&self, text: &str) -> IndexResult<Vec<f32>> {
        self.post("/embed/text", &TextRequest { text }).await
    }
}

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Exponential backoff from 500ms, capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = BASE_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(ms.min(MAX_BACKOFF_MS))
}
