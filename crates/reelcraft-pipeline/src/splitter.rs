//! Scene splitting stage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelcraft_media::fs_utils::file_name_lossy;
use reelcraft_media::metadata::MetadataPass;
use reelcraft_media::{
    ensure_dir, list_files, record_clip_metadata, split_video_scenes, write_sidecar, DurationProbe,
    FfprobeDuration, SceneDetector, SkippedClip, SplitOptions,
};
use reelcraft_models::naming::{is_video_file, stats_file_name};
use reelcraft_models::{ClipMetadataMap, SidecarPolicy};
use serde::Serialize;
use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::logging::StageLogger;
use crate::outcome::{BatchReport, ItemOutcome};

/// Result of splitting a directory of raw videos.
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub videos: BatchReport,
    /// Sidecar contents after the metadata pass
    pub metadata: ClipMetadataMap,
    pub skipped_clips: Vec<SkippedClip>,
}

/// Detects scenes, cuts them into clips and records clip metadata.
#[derive(Clone)]
pub struct SceneSplitter {
    detector: Arc<dyn SceneDetector>,
    probe: Arc<dyn DurationProbe>,
    options: SplitOptions,
    stats_dir: Option<PathBuf>,
}

impl SceneSplitter {
    pub fn new(detector: Arc<dyn SceneDetector>, probe: Arc<dyn DurationProbe>, options: SplitOptions) -> Self {
        Self {
            detector,
            probe,
            options,
            stats_dir: None,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let splitter = Self::new(config.detector(), Arc::new(FfprobeDuration), config.split_options());
        if config.write_stats {
            splitter.with_stats_dir(&config.stats_dir)
        } else {
            splitter
        }
    }

    /// Write per-video scene stats CSVs into `dir`.
    pub fn with_stats_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.stats_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Split one video into scene clips inside `clips_dir`.
    pub async fn split_video(&self, video: &Path, clips_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
        let stats_file = match &self.stats_dir {
            Some(dir) => {
                ensure_dir(dir).await?;
                let stem = video.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
                Some(dir.join(stats_file_name(&stem)))
            }
            None => None,
        };

        let scenes = self.detector.detect(video, stats_file.as_deref()).await?;
        let clips = split_video_scenes(video, &scenes, clips_dir, &self.options).await?;
        Ok(clips)
    }

    /// Split every video in `videos_dir`, then rebuild the clip sidecar.
    ///
    /// A video that fails is reported and the rest still get split.
    pub async fn split_directory(
        &self,
        videos_dir: &Path,
        clips_dir: &Path,
        policy: SidecarPolicy,
    ) -> PipelineResult<SplitReport> {
        let videos = list_files(videos_dir, |p| is_video_file(p)).await?;
        self.split_videos(&videos, clips_dir, policy).await
    }

    /// Split `videos` in order, then rebuild the clip sidecar.
    pub async fn split_videos(
        &self,
        videos: &[PathBuf],
        clips_dir: &Path,
        policy: SidecarPolicy,
    ) -> PipelineResult<SplitReport> {
        let logger = StageLogger::new("split");
        let span = logger.create_span();
        self.split_videos_inner(videos, clips_dir, policy, &logger)
            .instrument(span)
            .await
    }

    async fn split_videos_inner(
        &self,
        videos: &[PathBuf],
        clips_dir: &Path,
        policy: SidecarPolicy,
        logger: &StageLogger,
    ) -> PipelineResult<SplitReport> {
        logger.log_start(&format!(
            "splitting {} videos with the {} detector",
            videos.len(),
            self.detector.name()
        ));
        ensure_dir(clips_dir).await?;

        let mut report = BatchReport::new("split");
        for video in videos {
            let name = file_name_lossy(video);
            match self.split_video(video, clips_dir).await {
                Ok(clips) if clips.is_empty() => {
                    logger.log_warning(&format!("{name}: no scenes detected"));
                    report.record(name, ItemOutcome::Skipped { reason: "no scenes detected".into() });
                }
                Ok(clips) => {
                    logger.log_progress(&format!("{name}: {} clips", clips.len()));
                    let outputs = clips.iter().map(|c| file_name_lossy(c)).collect();
                    report.record(name, ItemOutcome::success(outputs));
                }
                Err(e) => {
                    logger.log_error(&format!("{name}: {e}"));
                    report.record(name, ItemOutcome::failed(&e));
                }
            }
        }

        let pass = self.record_metadata(clips_dir, policy).await?;
        logger.log_completion(&format!(
            "{} videos split, {} clips in the sidecar",
            report.succeeded(),
            pass.entries.len()
        ));

        Ok(SplitReport {
            videos: report,
            metadata: pass.entries,
            skipped_clips: pass.skipped,
        })
    }

    /// Probe every clip in `clips_dir` and write its sidecar.
    ///
    /// The returned pass holds the entries as written.
    pub async fn record_metadata(&self, clips_dir: &Path, policy: SidecarPolicy) -> PipelineResult<MetadataPass> {
        let pass = record_clip_metadata(clips_dir, self.probe.as_ref()).await?;
        let entries = write_sidecar(clips_dir, pass.entries, policy).await?;
        Ok(MetadataPass {
            entries,
            skipped: pass.skipped,
        })
    }
}
