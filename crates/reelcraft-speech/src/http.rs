//! Shared JSON POST with auth and retries.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::GoogleAuth;
use crate::error::{SpeechError, SpeechResult};

/// Authenticated JSON client for one Google API.
#[derive(Debug, Clone)]
pub(crate) struct GoogleHttp {
    http: Client,
    auth: GoogleAuth,
    max_retries: u32,
}

impl GoogleHttp {
    pub(crate) fn new(auth: GoogleAuth, timeout: Duration, max_retries: u32) -> SpeechResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reelcraft-speech/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SpeechError::Network)?;
        Ok(Self {
            http,
            auth,
            max_retries,
        })
    }

    /// POST `body` to `url` and decode the JSON reply.
    pub(crate) async fn post_json<B, R>(&self, url: &str, body: &B) -> SpeechResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.with_retry(|| self.post_once(url, body)).await
    }

    async fn post_once<B, R>(&self, url: &str, body: &B) -> SpeechResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        debug!("POST {}", url);
        let request = self.auth.authorize(self.http.post(url).json(body)).await?;
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            self.auth.invalidate().await;
        }
        Err(SpeechError::from_http_status(status.as_u16(), text))
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> SpeechResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = SpeechResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Speech request failed (attempt {}), retrying in {:?}: {}",
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

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Exponential backoff from 500ms, capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = BASE_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(ms.min(MAX_BACKOFF_MS))
}
