//! Reel assembly: narration, caption timing, clip selection and rendering.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reelcraft_media::fs_utils::file_name_lossy;
use reelcraft_media::{
    burn_captions, compose_reel, concat_reels, ensure_dir, select_clips, total_duration, CaptionStyle, ClipSegment,
    DurationProbe, FfprobeDuration, MediaResult,
};
use reelcraft_models::encoding::{FINAL_HEIGHT, FINAL_WIDTH};
use reelcraft_models::{EncodingConfig, ReelScript, WordTiming};
use reelcraft_speech::{align_transcript, SpeechSynthesizer, Transcriber};
use serde::Serialize;
use tracing::{debug, Instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::logging::StageLogger;
use crate::outcome::{BatchReport, ItemOutcome};

/// Name of the concatenated reel inside the reels directory.
pub const FINAL_REEL_NAME: &str = "final_reel.mp4";

/// Renders reels from clips, narration and caption timings.
#[async_trait]
pub trait ReelCompositor: Send + Sync {
    /// Join `segments` over the narration track in `audio`.
    async fn compose(&self, segments: &[ClipSegment], audio: &Path, output: &Path) -> MediaResult<()>;

    /// Burn word-highlighted captions into `video`.
    async fn caption(&self, video: &Path, timings: &[WordTiming], output: &Path) -> MediaResult<()>;

    /// Concatenate finished reels into one normalized video.
    async fn concat(&self, reels: &[PathBuf], output: &Path) -> MediaResult<()>;
}

/// Compositor driving ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCompositor {
    pub encoding: EncodingConfig,
    pub style: CaptionStyle,
}

#[async_trait]
impl ReelCompositor for FfmpegCompositor {
    async fn compose(&self, segments: &[ClipSegment], audio: &Path, output: &Path) -> MediaResult<()> {
        compose_reel(segments, audio, output, &self.encoding).await
    }

    async fn caption(&self, video: &Path, timings: &[WordTiming], output: &Path) -> MediaResult<()> {
        burn_captions(video, timings, output, &self.style).await
    }

    async fn concat(&self, reels: &[PathBuf], output: &Path) -> MediaResult<()> {
        concat_reels(reels, output, (FINAL_WIDTH, FINAL_HEIGHT), &self.encoding).await
    }
}

/// One assembled reel.
#[derive(Debug, Clone, Serialize)]
pub struct ReelOutput {
    pub path: PathBuf,
    pub narration_duration: f64,
    pub segments: Vec<ClipSegment>,
    pub timings: Vec<WordTiming>,
}

/// Outcome of assembling a batch of reels.
#[derive(Debug, Clone, Serialize)]
pub struct ReelBatch {
    pub reels: BatchReport,
    /// Concatenation of every reel that succeeded
    pub final_reel: Option<PathBuf>,
}

/// Place a requested clip path inside `clips_dir`.
///
/// Accepts a path relative to `clips_dir` or one already prefixed with it.
/// Absolute paths elsewhere and `..` components are invalid input. Existence
/// is not checked.
pub fn clip_path_in(clips_dir: &Path, clip: &Path) -> PipelineResult<PathBuf> {
    let relative = clip.strip_prefix(clips_dir).unwrap_or(clip);
    let confined = relative.components().next().is_some()
        && relative.components().all(|c| matches!(c, Component::Normal(_)));
    if !confined {
        return Err(PipelineError::invalid_input(format!(
            "clip must be inside the clips directory: {}",
            clip.display()
        )));
    }
    Ok(clips_dir.join(relative))
}

#[derive(Clone)]
pub struct ReelAssembler {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    transcriber: Arc<dyn Transcriber>,
    compositor: Arc<dyn ReelCompositor>,
    probe: Arc<dyn DurationProbe>,
    clips_dir: PathBuf,
    reels_dir: PathBuf,
}

impl ReelAssembler {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        transcriber: Arc<dyn Transcriber>,
        clips_dir: impl Into<PathBuf>,
        reels_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            synthesizer,
            transcriber,
            compositor: Arc::new(FfmpegCompositor::default()),
            probe: Arc::new(FfprobeDuration),
            clips_dir: clips_dir.into(),
            reels_dir: reels_dir.into(),
        }
    }

    pub fn with_compositor(mut self, compositor: Arc<dyn ReelCompositor>) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn DurationProbe>) -> Self {
        self.probe = probe;
        self
    }

    fn resolve_clip(&self, clip: &Path) -> PipelineResult<PathBuf> {
        let path = clip_path_in(&self.clips_dir, clip)?;
        if !path.is_file() {
            return Err(PipelineError::not_found(format!("clip {}", clip.display())));
        }
        Ok(path)
    }

    /// Assemble one narrated, captioned reel at `output`.
    pub async fn create_reel(&self, reel: &ReelScript, output: &Path) -> PipelineResult<ReelOutput> {
        let script = reel.words().join(" ");
        if script.is_empty() {
            return Err(PipelineError::invalid_input("script is empty"));
        }
        if reel.clips.is_empty() {
            return Err(PipelineError::invalid_input("no clips given"));
        }
        let clips: Vec<PathBuf> = reel
            .clips
            .iter()
            .map(|c| self.resolve_clip(c))
            .collect::<PipelineResult<_>>()?;

        let audio = self.synthesizer.synthesize(&script).await?;
        let transcript = self.transcriber.transcribe(&audio).await?;
        let timings = align_transcript(&transcript, &script);

        let work_dir = tempfile::tempdir()?;
        let narration_path = work_dir.path().join("narration.mp3");
        tokio::fs::write(&narration_path, &audio).await?;
        let narration_duration = self.probe.duration(&narration_path).await?;

        let mut durations = Vec::with_capacity(clips.len());
        for clip in clips {
            let duration = self.probe.duration(&clip).await?;
            durations.push((clip, duration));
        }
        let segments = select_clips(&durations, narration_duration);
        debug!(
            narration = narration_duration,
            selected = segments.len(),
            covered = total_duration(&segments),
            "Selected clips"
        );

        if let Some(parent) = output.parent() {
            ensure_dir(parent).await?;
        }
        let uncaptioned = work_dir.path().join("uncaptioned.mp4");
        self.compositor.compose(&segments, &narration_path, &uncaptioned).await?;
        self.compositor.caption(&uncaptioned, &timings, output).await?;

        Ok(ReelOutput {
            path: output.to_path_buf(),
            narration_duration,
            segments,
            timings,
        })
    }

    /// Assemble every reel, then concatenate the ones that succeeded.
    ///
    /// The final video goes to `final_output`, or `final_reel.mp4` in the
    /// reels directory.
    pub async fn create_reels(
        &self,
        reels: &[ReelScript],
        final_output: Option<&Path>,
    ) -> PipelineResult<ReelBatch> {
        if reels.is_empty() {
            return Err(PipelineError::invalid_input("no reels requested"));
        }
        for clip in reels.iter().flat_map(|r| &r.clips) {
            clip_path_in(&self.clips_dir, clip)?;
        }
        let logger = StageLogger::new("assemble");
        let span = logger.create_span();
        async {
            logger.log_start(&format!("{} reels", reels.len()));
            ensure_dir(&self.reels_dir).await?;

            let mut report = BatchReport::new("assemble");
            let mut finished = Vec::new();
            for (idx, reel) in reels.iter().enumerate() {
                let name = format!("reel-{}-{:03}.mp4", logger.run_id(), idx + 1);
                let output = self.reels_dir.join(&name);
                match self.create_reel(reel, &output).await {
                    Ok(done) => {
                        logger.log_progress(&format!("{name}: {:.2}s", done.narration_duration));
                        report.record(&name, ItemOutcome::success(vec![output.to_string_lossy().into_owned()]));
                        finished.push(done.path);
                    }
                    Err(e) if e.is_not_found() => {
                        logger.log_warning(&format!("{name}: {e}"));
                        report.record(&name, ItemOutcome::NotFound { what: e.to_string() });
                    }
                    Err(e) => {
                        logger.log_error(&format!("{name}: {e}"));
                        report.record(&name, ItemOutcome::failed(e));
                    }
                }
            }

            let final_reel = if finished.is_empty() {
                logger.log_warning("no reels to concatenate");
                None
            } else {
                let output = final_output
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.reels_dir.join(FINAL_REEL_NAME));
                self.concatenate_all(&finished, &output).await?;
                Some(output)
            };

            logger.log_completion(&format!("{} of {} reels", report.succeeded(), reels.len()));
            Ok::<_, PipelineError>(ReelBatch {
                reels: report,
                final_reel,
            })
        }
        .instrument(span)
        .await
    }

    /// Concatenate finished reels at 1920x1080 into `output`.
    pub async fn concatenate_all(&self, reels: &[PathBuf], output: &Path) -> PipelineResult<()> {
        if reels.is_empty() {
            return Err(PipelineError::invalid_input("no reels to concatenate"));
        }
        if let Some(missing) = reels.iter().find(|r| !r.is_file()) {
            return Err(PipelineError::not_found(format!("reel {}", file_name_lossy(missing))));
        }
        if let Some(parent) = output.parent() {
            ensure_dir(parent).await?;
        }
        self.compositor.concat(reels, output).await?;
        Ok(())
    }
}
