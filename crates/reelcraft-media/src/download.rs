//! Video download using yt-dlp.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::command::require_tool;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_dir;

/// Best stream up to 1080p, falling back to 720p, then whatever exists.
pub const DOWNLOAD_FORMAT: &str =
    "bestvideo[height<=1080]+bestaudio/bestvideo[height<=720]+bestaudio/best";

/// Container the merged download is written in.
pub const MERGE_FORMAT: &str = "mp4";

/// Parse and check that `url` is an http(s) URL.
pub fn validate_url(url: &str) -> MediaResult<Url> {
    let parsed = Url::parse(url).map_err(|e| MediaError::invalid_input(format!("invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(MediaError::invalid_input(format!("unsupported URL scheme: {other}"))),
    }
}

/// yt-dlp arguments writing `url` to `<output_dir>/<id>.<ext>`.
pub fn download_args(url: &Url, output_dir: &Path, id: &str) -> Vec<String> {
    let template = output_dir.join(format!("{id}.%(ext)s"));
    vec![
        "-f".to_string(),
        DOWNLOAD_FORMAT.to_string(),
        "--merge-output-format".to_string(),
        MERGE_FORMAT.to_string(),
        "--no-playlist".to_string(),
        "--no-progress".to_string(),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
        url.as_str().to_string(),
    ]
}

/// Download `url` into `output_dir` under a random name.
///
/// Returns the path of the written file.
pub async fn download_video(url: &str, output_dir: &Path) -> MediaResult<PathBuf> {
    let url = validate_url(url)?;
    require_tool("yt-dlp")?;
    ensure_dir(output_dir).await?;

    let id = uuid::Uuid::new_v4().simple().to_string();
    info!(url = %url, output_dir = %output_dir.display(), id = %id, "Downloading video");

    let output = Command::new("yt-dlp")
        .args(download_args(&url, output_dir, &id))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        let message = stderr.lines().last().unwrap_or("Unknown error");
        warn!(url = %url, error = %message, "yt-dlp failed");
        return Err(MediaError::download_failed(format!("yt-dlp failed: {message}")));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let path = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| output_dir.join(format!("{id}.{MERGE_FORMAT}")));

    if !path.exists() {
        return Err(MediaError::download_failed("Output file not created"));
    }

    let size = path.metadata()?.len();
    info!(
        output = %path.display(),
        size_mb = size as f64 / (1024.0 * 1024.0),
        "Downloaded video successfully"
    );
    Ok(path)
}
