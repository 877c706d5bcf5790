//! Index error types.

use std::path::PathBuf;

use thiserror::Error;

pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index not ready: {0}")]
    NotReady(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media error: {0}")]
    Media(#[from] reelcraft_media::MediaError),
}

impl IndexError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 | 502 | 503 | 504 => Self::ServiceUnavailable(format!("HTTP {status}: {body}")),
            _ => Self::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexError::ServiceUnavailable(_) | IndexError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(IndexError::from_http_status(503, "").is_retryable());
        assert!(IndexError::from_http_status(429, "").is_retryable());
        assert!(!IndexError::from_http_status(400, "bad filter").is_retryable());
        assert!(!IndexError::NotFound("x.mp4".into()).is_retryable());
    }
}
