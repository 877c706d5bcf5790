//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(#[from] reelcraft_media::MediaError),

    #[error("Speech error: {0}")]
    Speech(#[from] reelcraft_speech::SpeechError),

    #[error("Index error: {0}")]
    Index(#[from] reelcraft_index::IndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether a lookup came up empty, at any layer.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PipelineError::NotFound(_)
                | PipelineError::Index(reelcraft_index::IndexError::NotFound(_))
                | PipelineError::Media(reelcraft_media::MediaError::FileNotFound(_))
        )
    }

    /// Whether the caller sent something unusable.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidInput(_)
                | PipelineError::Config(_)
                | PipelineError::Media(reelcraft_media::MediaError::InvalidInput(_))
                | PipelineError::Speech(reelcraft_speech::SpeechError::EmptyInput(_))
                | PipelineError::Index(reelcraft_index::IndexError::Config(_))
        )
    }
}
