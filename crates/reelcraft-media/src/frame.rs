//! First-frame extraction.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// JPEG quality scale for `-q:v` (2 is near-lossless).
const JPEG_QUALITY: &str = "2";

/// Command writing the first decoded frame of `video` to `output`.
pub fn first_frame_command(video: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video, output)
        .single_frame()
        .output_args(["-q:v", JPEG_QUALITY])
}

/// Write the first frame of `video` as a still image.
pub async fn extract_first_frame(video: &Path, output: &Path) -> MediaResult<()> {
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }

    FfmpegRunner::new("first_frame")
        .run(&first_frame_command(video, output))
        .await?;

    // FFmpeg exits cleanly on streams with no decodable frame.
    if !output.exists() {
        return Err(MediaError::InvalidVideo(format!(
            "no frame could be read from {}",
            video.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_command() {
        let args = first_frame_command(Path::new("c/v-s-001.mp4"), Path::new("f/f-v-s-001.jpg"))
            .build_args()
            .join(" ");
        assert!(args.contains("-i c/v-s-001.mp4 -frames:v 1 -q:v 2 f/f-v-s-001.jpg"));
    }

    #[tokio::test]
    async fn test_missing_video() {
        let err = extract_first_frame(Path::new("/nonexistent/v.mp4"), Path::new("/tmp/x.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
