//! Cutting detected scenes into separate clip files.

use std::path::{Path, PathBuf};

use reelcraft_models::naming::{render_clip_name, DEFAULT_CLIP_TEMPLATE};
use reelcraft_models::{EncodingConfig, SceneBoundary};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_dir;

/// How split clips are named and encoded.
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Output name template (`$VIDEO_NAME`, `$SCENE_NUMBER`)
    pub template: String,
    pub encoding: EncodingConfig,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            template: DEFAULT_CLIP_TEMPLATE.to_string(),
            encoding: EncodingConfig::for_split(),
        }
    }
}

/// Build the FFmpeg command that cuts one scene.
pub fn scene_command(
    video: &Path,
    scene: &SceneBoundary,
    output: &Path,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(video, output)
        .seek(scene.start)
        .duration(scene.duration())
        .map("0:v:0")
        .map("0:a?")
        .video_codec(&encoding.codec)
        .preset(&encoding.preset)
        .crf(encoding.crf)
        .audio_codec(&encoding.audio_codec)
}

/// Split `video` into one clip per scene inside `output_dir`.
///
/// Returns the written clip paths in scene order.
pub async fn split_video_scenes(
    video: &Path,
    scenes: &[SceneBoundary],
    output_dir: &Path,
    options: &SplitOptions,
) -> MediaResult<Vec<PathBuf>> {
    let video_name = video
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| MediaError::invalid_input(format!("bad video name: {}", video.display())))?;

    ensure_dir(output_dir).await?;

    let runner = FfmpegRunner::new("split_scene");
    let mut clips = Vec::with_capacity(scenes.len());

    for (idx, scene) in scenes.iter().enumerate() {
        let clip_path = output_dir.join(render_clip_name(&options.template, video_name, idx + 1));
        debug!(
            clip = %clip_path.display(),
            start = scene.start,
            end = scene.end,
            "Cutting scene"
        );
        runner
            .run(&scene_command(video, scene, &clip_path, &options.encoding))
            .await?;
        clips.push(clip_path);
    }

    info!(
        video = %video.display(),
        clips = clips.len(),
        output_dir = %output_dir.display(),
        "Video split into scenes"
    );
    Ok(clips)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_command_args() {
        let scene = SceneBoundary::new(2.5, 6.0);
        let args = scene_command(
            Path::new("talk.mp4"),
            &scene,
            Path::new("clips/talk-s-002.mp4"),
            &EncodingConfig::for_split(),
        )
        .build_args()
        .join(" ");

        assert!(args.contains("-ss 2.500 -t 3.500 -i talk.mp4"));
        assert!(args.contains("-map 0:v:0 -map 0:a?"));
        assert!(args.contains("-preset veryfast -crf 22"));
        assert!(args.ends_with("clips/talk-s-002.mp4"));
    }
}
