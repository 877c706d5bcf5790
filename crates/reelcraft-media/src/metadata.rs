//! Clip duration/sequence recorder and the `metadata.json` sidecar.
//!
//! A pass returns the map it built; writing it out is a separate step with
//! an explicit [`SidecarPolicy`], so two passes never share state.

use std::path::{Path, PathBuf};

use reelcraft_models::naming::{is_video_file, parse_scene_sequence, SIDECAR_FILE_NAME};
use reelcraft_models::{ClipMetadata, ClipMetadataMap, SidecarPolicy};
use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{file_name_lossy, list_files};
use crate::probe::DurationProbe;

/// A clip left out of a pass and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedClip {
    pub file_name: String,
    pub reason: String,
}

/// Result of one directory pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetadataPass {
    pub entries: ClipMetadataMap,
    pub skipped: Vec<SkippedClip>,
}

/// Path of the sidecar inside `dir`.
pub fn sidecar_path(dir: &Path) -> PathBuf {
    dir.join(SIDECAR_FILE_NAME)
}

/// Probe every video clip in `dir` and build its metadata map.
///
/// Unreadable clips are logged and reported in `skipped`.
pub async fn record_clip_metadata(dir: &Path, probe: &dyn DurationProbe) -> MediaResult<MetadataPass> {
    let clips = list_files(dir, |p| is_video_file(p)).await?;
    let mut pass = MetadataPass::default();

    for clip in clips {
        let file_name = file_name_lossy(&clip);
        match probe.duration(&clip).await {
            Ok(duration) if duration.is_finite() && duration >= 0.0 => {
                let sequence = parse_scene_sequence(&file_name);
                pass.entries.insert(file_name, ClipMetadata { duration, sequence });
            }
            Ok(duration) => {
                warn!(clip = %file_name, duration, "Unusable clip duration, skipping");
                pass.skipped.push(SkippedClip {
                    file_name,
                    reason: format!("unusable duration {duration}"),
                });
            }
            Err(e) => {
                warn!(clip = %file_name, error = %e, "Failed to read clip duration, skipping");
                pass.skipped.push(SkippedClip {
                    file_name,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        dir = %dir.display(),
        recorded = pass.entries.len(),
        skipped = pass.skipped.len(),
        "Recorded clip metadata"
    );
    Ok(pass)
}

/// Load the sidecar in `dir`. A missing sidecar is an empty map.
pub async fn read_sidecar(dir: &Path) -> MediaResult<ClipMetadataMap> {
    let path = sidecar_path(dir);
    match fs::read(&path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClipMetadataMap::new()),
        Err(e) => Err(MediaError::Io(e)),
    }
}

/// Write `entries` to the sidecar in `dir` according to `policy`.
///
/// Returns the map that was written.
pub async fn write_sidecar(
    dir: &Path,
    entries: ClipMetadataMap,
    policy: SidecarPolicy,
) -> MediaResult<ClipMetadataMap> {
    let existing = match policy {
        SidecarPolicy::Merge => read_sidecar(dir).await?,
        SidecarPolicy::Replace => ClipMetadataMap::new(),
    };
    let merged = policy.apply(existing, entries);

    let path = sidecar_path(dir);
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(&merged)?).await?;
    fs::rename(&tmp, &path).await?;

    info!(
        sidecar = %path.display(),
        entries = merged.len(),
        policy = ?policy,
        "Wrote clip metadata sidecar"
    );
    Ok(merged)
}
