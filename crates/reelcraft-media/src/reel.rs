//! Clip selection against a narration track and reel composition.

use std::path::{Path, PathBuf};

use reelcraft_models::EncodingConfig;
use serde::Serialize;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// Durations closer than this are treated as equal.
const DURATION_EPSILON: f64 = 1e-6;

/// A clip chosen for a reel, possibly cut short.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipSegment {
    pub path: PathBuf,
    /// Seconds of the clip to use, from its start.
    pub duration: f64,
    pub trimmed: bool,
}

/// Pick clips in order until `narration` seconds are covered.
///
/// The clip that crosses the narration end is trimmed to fit and selection
/// stops there. Clips are never looped, so the total is
/// `min(narration, sum(clips))`.
pub fn select_clips(clips: &[(PathBuf, f64)], narration: f64) -> Vec<ClipSegment> {
    let mut selected = Vec::new();
    let mut total = 0.0;

    for (path, duration) in clips {
        let duration = duration.max(0.0);
        if total + duration <= narration + DURATION_EPSILON {
            total += duration;
            selected.push(ClipSegment {
                path: path.clone(),
                duration,
                trimmed: false,
            });
            continue;
        }

        let remaining = narration - total;
        if remaining > DURATION_EPSILON {
            selected.push(ClipSegment {
                path: path.clone(),
                duration: remaining,
                trimmed: true,
            });
        }
        break;
    }

    selected
}

/// Total seconds covered by `segments`.
pub fn total_duration(segments: &[ClipSegment]) -> f64 {
    segments.iter().map(|s| s.duration).sum()
}

/// Per-input scale/pad chain bringing every video stream to one frame size.
fn normalize_video(input: usize, width: u32, height: u32, fps: u32) -> String {
    format!(
        "[{input}:v]scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}[v{input}]"
    )
}

/// Filter graph concatenating the selected segments' video streams.
pub fn compose_filter(segments: usize, width: u32, height: u32, fps: u32) -> String {
    let mut parts: Vec<String> = (0..segments)
        .map(|i| normalize_video(i, width, height, fps))
        .collect();
    let labels: String = (0..segments).map(|i| format!("[v{i}]")).collect();
    parts.push(format!("{labels}concat=n={segments}:v=1:a=0[vout]"));
    parts.join(";")
}

/// Build the command that lays `audio` over the concatenated segments.
pub fn compose_command(
    segments: &[ClipSegment],
    audio: &Path,
    output: &Path,
    (width, height): (u32, u32),
    encoding: &EncodingConfig,
) -> MediaResult<FfmpegCommand> {
    let (first, rest) = segments
        .split_first()
        .ok_or_else(|| MediaError::invalid_input("no clips selected for the reel"))?;

    let mut cmd = FfmpegCommand::new(&first.path, output).duration(first.duration);
    for segment in rest {
        cmd = cmd.add_input(&segment.path).duration(segment.duration);
    }

    Ok(cmd
        .add_input(audio)
        .filter_complex(compose_filter(segments.len(), width, height, encoding.fps))
        .map("[vout]")
        .map(format!("{}:a", segments.len()))
        .video_codec(&encoding.codec)
        .preset(&encoding.preset)
        .crf(encoding.crf)
        .audio_codec(&encoding.audio_codec)
        .audio_bitrate(&encoding.audio_bitrate)
        .shortest())
}

/// Concatenate `segments` and set `audio` as the soundtrack.
///
/// The frame size follows the first segment.
pub async fn compose_reel(
    segments: &[ClipSegment],
    audio: &Path,
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    let first = segments
        .first()
        .ok_or_else(|| MediaError::invalid_input("no clips selected for the reel"))?;
    let info = probe_media(&first.path).await?;
    let size = (even(info.width), even(info.height));

    let cmd = compose_command(segments, audio, output, size, encoding)?;
    FfmpegRunner::new("compose_reel").run(&cmd).await?;

    info!(
        output = %output.display(),
        segments = segments.len(),
        duration = total_duration(segments),
        "Composed reel"
    );
    Ok(())
}

/// libx264 needs even dimensions.
fn even(v: u32) -> u32 {
    (v.max(2)) & !1
}

/// Audio layout of one reel going into the final concatenation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcatInput {
    pub has_audio: bool,
    pub duration: f64,
}

/// Filter graph for concatenating finished reels, some possibly silent.
///
/// Silent reels get generated silence cut to their own length.
pub fn concat_filter(inputs: &[ConcatInput], width: u32, height: u32, fps: u32) -> String {
    let n = inputs.len();
    let mut parts = Vec::with_capacity(n * 2 + 1);
    let mut labels = String::new();

    for (i, input) in inputs.iter().enumerate() {
        parts.push(normalize_video(i, width, height, fps));
        if input.has_audio {
            parts.push(format!("[{i}:a]aresample=44100,aformat=channel_layouts=stereo[a{i}]"));
        } else {
            parts.push(format!(
                "anullsrc=channel_layout=stereo:sample_rate=44100,atrim=duration={:.3}[a{i}]",
                input.duration
            ));
        }
        labels.push_str(&format!("[v{i}][a{i}]"));
    }

    parts.push(format!("{labels}concat=n={n}:v=1:a=1[vout][aout]"));
    parts.join(";")
}

/// Concatenate finished reels into one normalized video.
pub async fn concat_reels(
    inputs: &[PathBuf],
    output: &Path,
    (width, height): (u32, u32),
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    let (first, rest) = inputs
        .split_first()
        .ok_or_else(|| MediaError::invalid_input("no reels to concatenate"))?;

    let mut layout = Vec::with_capacity(inputs.len());
    for input in inputs {
        let info = probe_media(input).await?;
        layout.push(ConcatInput {
            has_audio: info.has_audio,
            duration: info.duration,
        });
    }

    let mut cmd = FfmpegCommand::new(first, output);
    for input in rest {
        cmd = cmd.add_input(input);
    }
    let cmd = cmd
        .filter_complex(concat_filter(&layout, width, height, encoding.fps))
        .map("[vout]")
        .map("[aout]")
        .video_codec(&encoding.codec)
        .preset(&encoding.preset)
        .crf(encoding.crf)
        .audio_codec(&encoding.audio_codec)
        .audio_bitrate(&encoding.audio_bitrate);

    FfmpegRunner::new("concat_reels").run(&cmd).await?;

    info!(output = %output.display(), reels = inputs.len(), "Concatenated reels");
    Ok(())
}
