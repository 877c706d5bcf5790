//! Upload, split, first-frame and download handlers.

use std::path::{Path, PathBuf};

use axum::extract::{Multipart, Query, State};
use axum::Json;
use reelcraft_media::download_video as fetch_video;
use reelcraft_media::fs_utils::file_name_lossy;
use reelcraft_models::naming::is_video_file;
use reelcraft_models::SidecarPolicy;
use reelcraft_pipeline::{BatchReport, SplitReport};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Multipart field carrying uploaded videos.
pub const VIDEO_FIELD: &str = "video_files";

#[derive(Debug, Default, Deserialize)]
pub struct ClipVideosQuery {
    /// Clip directory relative to the data directory
    pub output_dir: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClipVideosResponse {
    pub uploaded: Vec<String>,
    pub output_dir: PathBuf,
    #[serde(flatten)]
    pub report: SplitReport,
}

/// Upload videos, split them into scene clips and write the clip sidecar.
pub async fn clip_videos(
    State(state): State<AppState>,
    Query(query): Query<ClipVideosQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<ClipVideosResponse>> {
    let clips_dir = state.data_subdir(query.output_dir.as_deref(), &state.pipeline.clips_dir)?;
    let videos_dir = &state.pipeline.videos_dir;
    tokio::fs::create_dir_all(videos_dir).await?;

    let mut uploaded = Vec::new();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let file_name = upload_file_name(field.file_name())?;
        let path = videos_dir.join(&file_name);

        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::bad_request(format!("upload of {file_name} interrupted: {e}")))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        info!(video = %file_name, "Saved upload");
        uploaded.push(path);
    }

    if uploaded.is_empty() {
        return Err(ApiError::bad_request(format!("no files in the '{VIDEO_FIELD}' field")));
    }

    let report = state
        .splitter
        .split_videos(&uploaded, &clips_dir, SidecarPolicy::Replace)
        .await?;

    Ok(Json(ClipVideosResponse {
        uploaded: uploaded.iter().map(|p| file_name_lossy(p)).collect(),
        output_dir: clips_dir,
        report,
    }))
}

/// Base name of an uploaded video, which must carry a video extension.
fn upload_file_name(raw: Option<&str>) -> ApiResult<String> {
    let name = raw
        .and_then(|n| Path::new(n).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .ok_or_else(|| ApiError::bad_request("uploaded file has no name"))?;
    if !is_video_file(&name) {
        return Err(ApiError::bad_request(format!("not a video file: {name}")));
    }
    Ok(name)
}

/// Write the first frame of every clip.
pub async fn extract_images(State(state): State<AppState>) -> ApiResult<Json<BatchReport>> {
    let report = state
        .extractor
        .extract_directory(&state.pipeline.clips_dir, &state.pipeline.frames_dir)
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize, Validate)]
pub struct DownloadRequest {
    #[validate(url)]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub path: PathBuf,
}

/// Fetch a video by URL into the downloads directory.
pub async fn download_video(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    request.validate()?;
    let path = fetch_video(&request.url, &state.pipeline.downloads_dir).await?;
    Ok(Json(DownloadResponse { path }))
}
