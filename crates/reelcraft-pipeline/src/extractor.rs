//! First-frame extraction stage.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reelcraft_media::fs_utils::file_name_lossy;
use reelcraft_media::{ensure_dir, extract_first_frame, list_files, MediaResult};
use reelcraft_models::naming::frame_name_for_clip;
use tracing::Instrument;

use crate::error::{PipelineError, PipelineResult};
use crate::logging::StageLogger;
use crate::outcome::{BatchReport, ItemOutcome};

/// Writes the first frame of a clip as a still.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn first_frame(&self, clip: &Path, output: &Path) -> MediaResult<()>;
}

/// Frame source backed by ffmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegFrames;

#[async_trait]
impl FrameSource for FfmpegFrames {
    async fn first_frame(&self, clip: &Path, output: &Path) -> MediaResult<()> {
        extract_first_frame(clip, output).await
    }
}

fn is_mp4(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mp4"))
}

#[derive(Clone)]
pub struct FrameExtractor {
    source: Arc<dyn FrameSource>,
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new(Arc::new(FfmpegFrames))
    }
}

impl FrameExtractor {
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        Self { source }
    }

    /// Write `f-<clip-stem>.jpg` into `frames_dir` for every `.mp4` clip.
    pub async fn extract_directory(&self, clips_dir: &Path, frames_dir: &Path) -> PipelineResult<BatchReport> {
        let logger = StageLogger::new("extract");
        let span = logger.create_span();
        async {
            let clips = list_files(clips_dir, is_mp4).await?;
            ensure_dir(frames_dir).await?;
            logger.log_start(&format!("{} clips", clips.len()));

            let mut report = BatchReport::new("extract");
            for clip in clips {
                let clip_name = file_name_lossy(&clip);
                let frame_name = frame_name_for_clip(&clip_name);
                match self.source.first_frame(&clip, &frames_dir.join(&frame_name)).await {
                    Ok(()) => report.record(clip_name, ItemOutcome::success(vec![frame_name])),
                    Err(e) => {
                        logger.log_warning(&format!("{clip_name}: {e}"));
                        report.record(clip_name, ItemOutcome::failed(e));
                    }
                }
            }

            logger.log_completion(&format!("{} frames written", report.succeeded()));
            Ok::<_, PipelineError>(report)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcraft_media::MediaError;
    use tempfile::TempDir;

    struct FakeFrames;

    #[async_trait]
    impl FrameSource for FakeFrames {
        async fn first_frame(&self, clip: &Path, output: &Path) -> MediaResult<()> {
            if file_name_lossy(clip).contains("empty") {
                return Err(MediaError::InvalidVideo("no frame".into()));
            }
            tokio::fs::write(output, b"jpeg").await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_extract_directory_only_mp4() {
        let root = TempDir::new().unwrap();
        let clips = root.path().join("clips");
        let frames = root.path().join("frames");
        tokio::fs::create_dir_all(&clips).await.unwrap();
        for name in ["v-s-001.mp4", "v-s-002.MP4", "empty-s-001.mp4", "v-s-003.mkv", "metadata.json"] {
            tokio::fs::write(clips.join(name), b"x").await.unwrap();
        }

        let report = FrameExtractor::new(Arc::new(FakeFrames))
            .extract_directory(&clips, &frames)
            .await
            .unwrap();

        let items: Vec<&str> = report.items.iter().map(|i| i.item.as_str()).collect();
        assert_eq!(items, ["empty-s-001.mp4", "v-s-001.mp4", "v-s-002.MP4"]);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(frames.join("f-v-s-001.jpg").is_file());
        assert!(frames.join("f-v-s-002.jpg").is_file());
    }

    #[tokio::test]
    async fn test_missing_clips_dir() {
        let root = TempDir::new().unwrap();
        let err = FrameExtractor::new(Arc::new(FakeFrames))
            .extract_directory(&root.path().join("clips"), &root.path().join("frames"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
