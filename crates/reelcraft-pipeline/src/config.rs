//! Pipeline configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use reelcraft_media::{ensure_dir, AdaptiveParams, FfmpegSceneDetector, SceneDetectCli, SceneDetector, SplitOptions};
use reelcraft_models::naming::DEFAULT_CLIP_TEMPLATE;
use reelcraft_models::EncodingConfig;

use crate::error::{PipelineError, PipelineResult};

/// Which scene detector drives the splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorBackend {
    #[default]
    Ffmpeg,
    SceneDetect,
}

impl FromStr for DetectorBackend {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(Self::Ffmpeg),
            "scenedetect" | "pyscenedetect" => Ok(Self::SceneDetect),
            other => Err(PipelineError::Config(format!("unknown scene detector: {other}"))),
        }
    }
}

/// Directory layout and stage settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of all pipeline directories
    pub data_dir: PathBuf,
    /// Uploaded raw videos
    pub videos_dir: PathBuf,
    /// Split scene clips and their sidecar
    pub clips_dir: PathBuf,
    /// First-frame stills
    pub frames_dir: PathBuf,
    /// Per-video scene score CSVs
    pub stats_dir: PathBuf,
    /// Assembled reels
    pub reels_dir: PathBuf,
    /// Videos fetched by URL
    pub downloads_dir: PathBuf,

    pub detector: DetectorBackend,
    pub adaptive_threshold: f64,
    /// Minimum frames between cuts
    pub min_scene_len: usize,
    pub write_stats: bool,
    pub clip_template: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_data_dir("data")
    }
}

impl PipelineConfig {
    /// Default settings rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let params = AdaptiveParams::default();
        Self {
            videos_dir: data_dir.join("videos"),
            clips_dir: data_dir.join("clips"),
            frames_dir: data_dir.join("frames"),
            stats_dir: data_dir.join("stats"),
            reels_dir: data_dir.join("reels"),
            downloads_dir: data_dir.join("downloads"),
            data_dir,
            detector: DetectorBackend::default(),
            adaptive_threshold: params.adaptive_threshold,
            min_scene_len: params.min_scene_len,
            write_stats: true,
            clip_template: DEFAULT_CLIP_TEMPLATE.to_string(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        let data_dir = std::env::var("REELCRAFT_DATA_DIR").unwrap_or_else(|_| "data".to_string());
        let mut config = Self::with_data_dir(data_dir);

        if let Ok(backend) = std::env::var("SCENE_DETECTOR") {
            config.detector = backend.parse()?;
        }
        config.adaptive_threshold = std::env::var("SCENE_ADAPTIVE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.adaptive_threshold);
        config.min_scene_len = std::env::var("SCENE_MIN_LEN")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.min_scene_len);
        config.write_stats = std::env::var("SCENE_WRITE_STATS")
            .map(|s| s != "false" && s != "0")
            .unwrap_or(true);
        if let Ok(template) = std::env::var("CLIP_NAME_TEMPLATE") {
            config.clip_template = template;
        }
        Ok(config)
    }

    /// Scene detector for the configured backend.
    pub fn detector(&self) -> Arc<dyn SceneDetector> {
        match self.detector {
            DetectorBackend::Ffmpeg => Arc::new(FfmpegSceneDetector::new(AdaptiveParams {
                adaptive_threshold: self.adaptive_threshold,
                min_scene_len: self.min_scene_len,
                ..AdaptiveParams::default()
            })),
            DetectorBackend::SceneDetect => Arc::new(SceneDetectCli {
                adaptive_threshold: self.adaptive_threshold,
                min_scene_len: self.min_scene_len,
            }),
        }
    }

    pub fn split_options(&self) -> SplitOptions {
        SplitOptions {
            template: self.clip_template.clone(),
            encoding: EncodingConfig::for_split(),
        }
    }

    /// Create every pipeline directory.
    pub async fn ensure_dirs(&self) -> PipelineResult<()> {
        for dir in [
            &self.videos_dir,
            &self.clips_dir,
            &self.frames_dir,
            &self.stats_dir,
            &self.reels_dir,
            &self.downloads_dir,
        ] {
            ensure_dir(dir).await?;
        }
        Ok(())
    }
}
