//! Reel assembly handler.

use axum::extract::State;
use axum::Json;
use reelcraft_models::ReelScript;
use reelcraft_pipeline::{clip_path_in, ReelBatch};
use serde::Deserialize;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReelsRequest {
    #[validate(length(min = 1, max = 50))]
    pub reels: Vec<ReelScript>,
    /// File name of the concatenated reel inside the reels directory
    pub output_name: Option<String>,
}

/// Assemble each reel, then concatenate them.
pub async fn create_reels(
    State(state): State<AppState>,
    Json(request): Json<CreateReelsRequest>,
) -> ApiResult<Json<ReelBatch>> {
    request.validate()?;
    for clip in request.reels.iter().flat_map(|r| &r.clips) {
        clip_path_in(&state.pipeline.clips_dir, clip)?;
    }
    let assembler = state.assembler()?;

    let final_output = match request.output_name.as_deref() {
        Some(name) => {
            let valid = !name.is_empty()
                && !name.starts_with('.')
                && name.ends_with(".mp4")
                && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
            if !valid {
                return Err(ApiError::bad_request(format!("invalid output name: {name}")));
            }
            Some(state.pipeline.reels_dir.join(name))
        }
        None => None,
    };

    let batch = assembler.create_reels(&request.reels, final_output.as_deref()).await?;
    Ok(Json(batch))
}
