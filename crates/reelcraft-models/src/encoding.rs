//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Preset used for scene splitting
pub const SPLIT_PRESET: &str = "veryfast";
/// CRF used for scene splitting
pub const SPLIT_CRF: u8 = 22;
/// Default encoding preset for reels
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF for reels
pub const DEFAULT_CRF: u8 = 20;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Final concatenation frame rate
pub const FINAL_FPS: u32 = 24;
/// Final concatenation resolution
pub const FINAL_WIDTH: u32 = 1920;
pub const FINAL_HEIGHT: u32 = 1080;

/// Reel encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    #[serde(default = "default_video_codec")]
    pub codec: String,

    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_fps() -> u32 {
    FINAL_FPS
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            crf: DEFAULT_CRF,
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            fps: FINAL_FPS,
        }
    }
}

impl EncodingConfig {
    /// Settings used when cutting scenes out of a source video.
    pub fn for_split() -> Self {
        Self {
            preset: SPLIT_PRESET.to_string(),
            crf: SPLIT_CRF,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: EncodingConfig = serde_json::from_str(r#"{"crf": 18}"#).unwrap();
        assert_eq!(cfg.crf, 18);
        assert_eq!(cfg.codec, "libx264");
        assert_eq!(cfg.fps, 24);
    }

    #[test]
    fn test_split_settings() {
        let cfg = EncodingConfig::for_split();
        assert_eq!(cfg.preset, "veryfast");
        assert_eq!(cfg.crf, 22);
    }
}
