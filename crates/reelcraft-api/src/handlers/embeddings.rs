//! Embedding store, search, delete and script mapping handlers.

use axum::extract::State;
use axum::Json;
use reelcraft_index::{DeleteOutcome, StoreReport, DEFAULT_TOP_K};
use reelcraft_models::QueryResults;
use reelcraft_pipeline::{EmbeddingStage, SentenceClips};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiResult;
use crate::state::AppState;

/// Index credentials; omitted fields come from the environment.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct IndexCredentials {
    #[validate(length(min = 1))]
    pub api_key: Option<String>,
    #[validate(length(min = 1, max = 45))]
    pub index_name: Option<String>,
}

impl IndexCredentials {
    async fn connect(self, state: &AppState) -> ApiResult<EmbeddingStage> {
        Ok(state.index.connect(self.api_key, self.index_name).await?)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoreEmbeddingsRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub credentials: IndexCredentials,
    /// Frame directory relative to the data directory
    pub image_dir: Option<String>,
    /// Clip directory holding the sidecar, relative to the data directory
    pub clips_dir: Option<String>,
}

/// Embed and upsert every frame still.
pub async fn store_embeddings(
    State(state): State<AppState>,
    Json(request): Json<StoreEmbeddingsRequest>,
) -> ApiResult<Json<StoreReport>> {
    request.validate()?;
    let frames_dir = state.data_subdir(request.image_dir.as_deref(), &state.pipeline.frames_dir)?;
    let clips_dir = state.data_subdir(request.clips_dir.as_deref(), &state.pipeline.clips_dir)?;
    let stage = request.credentials.connect(&state).await?;
    let report = stage.store_frames(&frames_dir, &clips_dir).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub credentials: IndexCredentials,
    #[validate(length(min = 1, max = 2000))]
    pub query_sentence: String,
    #[validate(range(min = 1, max = 100))]
    pub top_k: Option<usize>,
}

/// Frames most similar to a sentence.
pub async fn retrieve_embeddings(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryResults>> {
    request.validate()?;
    let stage = request.credentials.connect(&state).await?;
    let results = stage
        .search(&request.query_sentence, request.top_k.unwrap_or(DEFAULT_TOP_K))
        .await?;
    Ok(Json(results))
}

/// Delete every vector in the index.
pub async fn delete_embeddings(
    State(state): State<AppState>,
    Json(credentials): Json<IndexCredentials>,
) -> ApiResult<Json<DeleteOutcome>> {
    credentials.validate()?;
    let stage = credentials.connect(&state).await?;
    Ok(Json(stage.delete_all().await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct MapScriptRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub credentials: IndexCredentials,
    #[validate(length(min = 1))]
    pub script: String,
    #[validate(range(min = 1, max = 100))]
    pub top_k: Option<usize>,
    /// Clip directory relative to the data directory
    pub clips_dir: Option<String>,
}

/// Sentences in script order; repeated sentences keep their own entry.
#[derive(Debug, Serialize)]
pub struct MapScriptResponse {
    pub sentences: Vec<SentenceClips>,
}

/// Map each sentence of a script to matching clips.
///
/// Answers 404 when a matched frame's clip is no longer on disk.
pub async fn map_script(
    State(state): State<AppState>,
    Json(request): Json<MapScriptRequest>,
) -> ApiResult<Json<MapScriptResponse>> {
    request.validate()?;
    let clips_dir = state.data_subdir(request.clips_dir.as_deref(), &state.pipeline.clips_dir)?;
    let stage = request.credentials.connect(&state).await?;
    let sentences = stage
        .map_script_to_clips(&request.script, &clips_dir, request.top_k.unwrap_or(DEFAULT_TOP_K))
        .await?;
    Ok(Json(MapScriptResponse { sentences }))
}
