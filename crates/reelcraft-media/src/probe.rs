//! FFprobe video information.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Whether an audio stream is present
    pub has_audio: bool,
    pub has_video: bool,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Probe a media file (video or audio).
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe could not read {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Probe a video file; fails when no video stream is present.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let info = probe_media(path).await?;
    if !info.has_video {
        return Err(MediaError::InvalidVideo("No video stream found".to_string()));
    }
    Ok(info)
}

/// Get media duration in seconds.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    Ok(probe_media(path).await?.duration)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    // Container duration first, then any stream that reports one.
    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref()?.parse::<f64>().ok())
                .reduce(f64::max)
        })
        .ok_or_else(|| MediaError::InvalidVideo("Duration not reported".to_string()))?;

    let fps = video
        .and_then(|v| v.avg_frame_rate.as_deref().or(v.r_frame_rate.as_deref()))
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    Ok(VideoInfo {
        duration,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        fps,
        has_audio,
        has_video: video.is_some(),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

/// Source of clip durations.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration(&self, path: &Path) -> MediaResult<f64>;
}

/// Duration probe backed by ffprobe.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeDuration;

#[async_trait]
impl DurationProbe for FfprobeDuration {
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        get_duration(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_output_video() {
        let json = br#"{
            "format": {"duration": "12.480000"},
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720, "avg_frame_rate": "25/1"},
                {"codec_type": "audio"}
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!((info.duration - 12.48).abs() < 1e-9);
        assert_eq!((info.width, info.height), (1280, 720));
        assert!(info.has_audio && info.has_video);
        assert!((info.fps - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_output_audio_stream_duration() {
        let json = br#"{
            "format": {},
            "streams": [{"codec_type": "audio", "duration": "3.5"}]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration, 3.5);
        assert!(!info.has_video);
    }

    #[test]
    fn test_parse_probe_output_without_duration() {
        let json = br#"{"format": {}, "streams": []}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidVideo(_))
        ));
    }
}
