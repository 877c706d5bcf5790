//! Application state.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reelcraft_index::{Embedder, HttpEmbedder, PineconeConfig};
use reelcraft_pipeline::{EmbeddingStage, FrameExtractor, PipelineConfig, PipelineResult, ReelAssembler, SceneSplitter};
use reelcraft_speech::{GoogleAuth, SpeechConfig, SpeechToTextClient, TextToSpeechClient};
use tracing::warn;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Opens the vector index a request names.
///
/// Credentials left out of a request fall back to the environment.
#[async_trait]
pub trait IndexConnector: Send + Sync {
    async fn connect(&self, api_key: Option<String>, index_name: Option<String>) -> PipelineResult<EmbeddingStage>;
}

/// Connector for Pinecone indexes searched with the embedding service.
pub struct PineconeConnector {
    embedder: Arc<dyn Embedder>,
    base: PineconeConfig,
}

impl PineconeConnector {
    pub fn new(embedder: Arc<dyn Embedder>, base: PineconeConfig) -> Self {
        Self { embedder, base }
    }
}

#[async_trait]
impl IndexConnector for PineconeConnector {
    async fn connect(&self, api_key: Option<String>, index_name: Option<String>) -> PipelineResult<EmbeddingStage> {
        let config = self.base.clone().with_credentials(api_key, index_name);
        EmbeddingStage::connect(Arc::clone(&self.embedder), config).await
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<PipelineConfig>,
    pub splitter: SceneSplitter,
    pub extractor: FrameExtractor,
    pub index: Arc<dyn IndexConnector>,
    /// Missing when speech credentials could not be loaded
    pub assembler: Option<ReelAssembler>,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(config: ApiConfig, pipeline: PipelineConfig) -> anyhow::Result<Self> {
        pipeline.ensure_dirs().await?;

        let embedder = Arc::new(HttpEmbedder::from_env()?);
        let index = Arc::new(PineconeConnector::new(embedder, PineconeConfig::from_env()));

        let speech = SpeechConfig::from_env();
        let assembler = match GoogleAuth::from_config(&speech).await {
            Ok(auth) => {
                let tts = TextToSpeechClient::new(speech.clone(), auth.clone())?;
                let stt = SpeechToTextClient::new(speech, auth)?;
                Some(ReelAssembler::new(
                    Arc::new(tts),
                    Arc::new(stt),
                    &pipeline.clips_dir,
                    &pipeline.reels_dir,
                ))
            }
            Err(e) => {
                warn!(error = %e, "Speech credentials unavailable, reel assembly disabled");
                None
            }
        };

        Ok(Self {
            config,
            splitter: SceneSplitter::from_config(&pipeline),
            extractor: FrameExtractor::default(),
            pipeline: Arc::new(pipeline),
            index,
            assembler,
        })
    }

    pub fn assembler(&self) -> ApiResult<&ReelAssembler> {
        self.assembler
            .as_ref()
            .ok_or_else(|| ApiError::internal("speech services are not configured"))
    }

    /// Resolve a request-supplied directory inside the data directory.
    ///
    /// Only plain relative paths are accepted.
    pub fn data_subdir(&self, requested: Option<&str>, default: &Path) -> ApiResult<PathBuf> {
        let Some(requested) = requested.filter(|r| !r.trim().is_empty()) else {
            return Ok(default.to_path_buf());
        };
        let path = Path::new(requested);
        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(ApiError::bad_request(format!(
                "directory must be relative to the data directory: {requested}"
            )));
        }
        Ok(self.pipeline.data_dir.join(path))
    }
}
