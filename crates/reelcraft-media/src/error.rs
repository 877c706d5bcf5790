//! Media errors.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    /// An external binary (ffmpeg, ffprobe, yt-dlp, scenedetect) is not on PATH.
    #[error("{tool} is not installed or not on PATH")]
    ToolMissing { tool: &'static str },

    #[error("ffmpeg exited unsuccessfully: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("could not probe media: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("scene detection failed: {0}")]
    DetectionFailed(String),

    #[error("video download failed: {message}")]
    DownloadFailed { message: String },

    #[error("no such file: {0}")]
    FileNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("unusable video: {0}")]
    InvalidVideo(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl MediaError {
    pub fn tool_missing(tool: &'static str) -> Self {
        Self::ToolMissing { tool }
    }

    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_missing_names_the_binary() {
        let err = MediaError::tool_missing("scenedetect");
        assert_eq!(err.to_string(), "scenedetect is not installed or not on PATH");
    }
}
