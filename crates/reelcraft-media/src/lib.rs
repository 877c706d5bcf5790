//! FFmpeg CLI wrapper for the reel pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with cancellation and timeouts
//! - Duration probing through ffprobe
//! - Content-adaptive scene detection and scene splitting
//! - First-frame extraction and the clip metadata sidecar
//! - Reel composition, highlighted captions and yt-dlp downloads

pub mod captions;
pub mod command;
pub mod download;
pub mod error;
pub mod frame;
pub mod fs_utils;
pub mod metadata;
pub mod probe;
pub mod reel;
pub mod scene;
pub mod split;

pub use captions::{build_caption_document, burn_captions, CaptionStyle};
pub use command::{check_ffmpeg, check_ffprobe, require_tool, FfmpegCommand, FfmpegProgress, FfmpegRunner};
pub use download::download_video;
pub use error::{MediaError, MediaResult};
pub use frame::extract_first_frame;
pub use fs_utils::{ensure_dir, list_files};
pub use metadata::{read_sidecar, record_clip_metadata, write_sidecar, MetadataPass, SkippedClip};
pub use probe::{get_duration, probe_media, probe_video, DurationProbe, FfprobeDuration, VideoInfo};
pub use reel::{compose_reel, concat_reels, select_clips, total_duration, ClipSegment};
pub use scene::{AdaptiveParams, FfmpegSceneDetector, SceneDetectCli, SceneDetector};
pub use split::{split_video_scenes, SplitOptions};
