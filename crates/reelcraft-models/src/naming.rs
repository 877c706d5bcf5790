//! File naming rules shared across stages.
//!
//! Scene clips are named from a template (`$VIDEO_NAME-s-$SCENE_NUMBER.mp4`
//! by default), first frames are `f-<clip stem>.jpg`, and a frame maps back
//! to its clip by reversing that rule.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Name of the per-directory clip metadata sidecar.
pub const SIDECAR_FILE_NAME: &str = "metadata.json";

/// Default output template for split scenes.
pub const DEFAULT_CLIP_TEMPLATE: &str = "$VIDEO_NAME-s-$SCENE_NUMBER.mp4";

/// Prefix for extracted first frames.
pub const FRAME_PREFIX: &str = "f-";

/// Extensions treated as source or clip videos.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Extensions treated as embeddable images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

fn sequence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"s-(\d+)").expect("valid scene sequence regex"))
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| allowed.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Whether the path has a recognised video extension (case-insensitive).
pub fn is_video_file(path: impl AsRef<Path>) -> bool {
    has_extension(path.as_ref(), VIDEO_EXTENSIONS)
}

/// Whether the path has a recognised image extension (case-insensitive).
pub fn is_image_file(path: impl AsRef<Path>) -> bool {
    has_extension(path.as_ref(), IMAGE_EXTENSIONS)
}

/// Parse the scene number from a clip filename.
///
/// Uses the last `s-<digits>` occurrence so video names that themselves
/// contain `s-<digits>` still resolve to the scene suffix. A number too large
/// for `u64` is treated as no sequence.
pub fn parse_scene_sequence(file_name: &str) -> Option<u64> {
    sequence_regex()
        .captures_iter(file_name)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Render a clip filename from a template.
///
/// Supports `$VIDEO_NAME` and `$SCENE_NUMBER` (1-based, zero-padded to 3).
pub fn render_clip_name(template: &str, video_name: &str, scene_number: usize) -> String {
    template
        .replace("$VIDEO_NAME", video_name)
        .replace("$SCENE_NUMBER", &format!("{:03}", scene_number))
}

/// First-frame image name for a clip file.
pub fn frame_name_for_clip(clip_file_name: &str) -> String {
    let stem = Path::new(clip_file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(clip_file_name);
    format!("{FRAME_PREFIX}{stem}.jpg")
}

/// Clip filename for a first-frame image path or name.
pub fn clip_name_for_frame(frame: &str) -> String {
    let base = Path::new(frame)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(frame);
    let base = base.strip_prefix(FRAME_PREFIX).unwrap_or(base);
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(base);
    format!("{stem}.mp4")
}

/// Vector id used for a stored image.
pub fn image_vector_id(file_name: &str) -> String {
    format!("image-{file_name}")
}

/// Stats CSV name for a source video.
pub fn stats_file_name(video_stem: &str) -> String {
    format!("{video_stem}_stats.csv")
}
