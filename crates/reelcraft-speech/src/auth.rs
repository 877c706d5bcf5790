//! Authentication for Google REST APIs.
//!
//! Either a plain API key or an OAuth token from application default
//! credentials, cached with:
//! - Refresh margin to avoid expiry mid-request
//! - Single-flight refresh under a write lock
//! - Fallback to the existing token while it is still usable

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use reqwest::RequestBuilder;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::SpeechConfig;
use crate::error::{SpeechError, SpeechResult};

/// Refresh the token 60 seconds before expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// TTL assumed when the provider reports no usable expiry.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope covering Text-to-Speech and Speech-to-Text.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe access token cache.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> SpeechResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited.
        if let Some(cached) = cache.as_ref().filter(|c| c.is_valid()) {
            return Ok(cached.access_token.clone());
        }

        match self.provider.token(&[CLOUD_PLATFORM_SCOPE]).await {
            Ok(token) => {
                let now = Utc::now();
                let exp = token.expires_at();
                let expires_at = if exp > now {
                    Instant::now() + (exp - now).to_std().unwrap_or(TOKEN_DEFAULT_TTL)
                } else {
                    Instant::now()
                };

                let access_token = token.as_str().to_string();
                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });
                debug!("Refreshed Google auth token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref().filter(|c| c.is_usable()) {
                    warn!("Token refresh failed, using existing token: {}", e);
                    return Ok(cached.access_token.clone());
                }
                Err(SpeechError::auth_error(format!("Failed to obtain auth token: {}", e)))
            }
        }
    }
}

/// How requests to Google are authenticated.
#[derive(Clone)]
pub enum GoogleAuth {
    ApiKey(String),
    Token(Arc<TokenCache>),
}

impl std::fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoogleAuth::ApiKey(_) => f.write_str("GoogleAuth::ApiKey(..)"),
            GoogleAuth::Token(_) => f.write_str("GoogleAuth::Token(..)"),
        }
    }
}

impl GoogleAuth {
    /// API key from the config, otherwise application default credentials.
    pub async fn from_config(config: &SpeechConfig) -> SpeechResult<Self> {
        if let Some(key) = &config.api_key {
            return Ok(GoogleAuth::ApiKey(key.clone()));
        }
        let provider = gcp_auth::provider()
            .await
            .map_err(|e| SpeechError::auth_error(format!("No Google credentials available: {}", e)))?;
        Ok(GoogleAuth::Token(Arc::new(TokenCache::new(provider))))
    }

    /// Attach credentials to a request.
    pub async fn authorize(&self, request: RequestBuilder) -> SpeechResult<RequestBuilder> {
        match self {
            GoogleAuth::ApiKey(key) => Ok(request.query(&[("key", key.as_str())])),
            GoogleAuth::Token(cache) => Ok(request.bearer_auth(cache.get_token().await?)),
        }
    }

    /// Forget a rejected token. No-op for API keys.
    pub async fn invalidate(&self) {
        if let GoogleAuth::Token(cache) = self {
            cache.invalidate().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_refresh_margin() {
        assert_eq!(TOKEN_REFRESH_MARGIN, Duration::from_secs(60));
        assert_eq!(TOKEN_DEFAULT_TTL, Duration::from_secs(50 * 60));
    }

    #[test]
    fn test_cached_token_validity() {
        let fresh = CachedToken {
            access_token: "a".into(),
            expires_at: Instant::now() + Duration::from_secs(600),
        };
        assert!(fresh.is_valid());

        let expiring = CachedToken {
            access_token: "b".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(!expiring.is_valid());
        assert!(expiring.is_usable());
    }

    #[tokio::test]
    async fn test_api_key_from_config() {
        let config = SpeechConfig {
            api_key: Some("k".into()),
            ..SpeechConfig::default()
        };
        let auth = GoogleAuth::from_config(&config).await.unwrap();
        assert!(matches!(auth, GoogleAuth::ApiKey(ref k) if k == "k"));
        assert_eq!(format!("{auth:?}"), "GoogleAuth::ApiKey(..)");
    }
}
