//! Embedding store, search and script-to-clip mapping.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelcraft_index::service::StoreReport;
use reelcraft_index::{clip_for_match, DeleteOutcome, Embedder, ImageSearchService, PineconeClient, PineconeConfig};
use reelcraft_media::read_sidecar;
use reelcraft_models::QueryResults;
use serde::Serialize;
use tracing::{info, warn, Instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::logging::StageLogger;

/// Clips matched to one sentence of a script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceClips {
    pub sentence: String,
    /// Best match first, without repeats.
    pub clips: Vec<PathBuf>,
}

/// Split `script` into trimmed sentences ending at `.`, `!` or `?`.
pub fn split_sentences(script: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in script.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }
    push_sentence(&mut sentences, &current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let sentence = raw.trim();
    if sentence.chars().any(char::is_alphanumeric) {
        sentences.push(sentence.to_string());
    }
}

/// Frame embeddings in one vector index.
#[derive(Clone)]
pub struct EmbeddingStage {
    service: ImageSearchService,
}

impl EmbeddingStage {
    pub fn new(service: ImageSearchService) -> Self {
        Self { service }
    }

    /// Open (creating if absent) the index named in `pinecone`.
    pub async fn connect(embedder: Arc<dyn Embedder>, pinecone: PineconeConfig) -> PipelineResult<Self> {
        let client = PineconeClient::new(pinecone)?;
        let index = client.connect().await?;
        info!(index = %index.name(), "Connected to vector index");
        Ok(Self::new(ImageSearchService::new(embedder, Arc::new(index))))
    }

    /// Embed every still in `frames_dir`, tagging vectors from the sidecar in `clips_dir`.
    pub async fn store_frames(&self, frames_dir: &Path, clips_dir: &Path) -> PipelineResult<StoreReport> {
        let logger = StageLogger::new("embed");
        async {
            let sidecar = read_sidecar(clips_dir).await?;
            logger.log_start(&format!(
                "storing frames from {} ({} clips in sidecar)",
                frames_dir.display(),
                sidecar.len()
            ));
            let report = self.service.store_directory_images(frames_dir, &sidecar).await?;
            if !report.failed.is_empty() {
                logger.log_warning(&format!("{} frames failed", report.failed.len()));
            }
            logger.log_completion(&format!("{} frames stored", report.stored.len()));
            Ok::<_, PipelineError>(report)
        }
        .instrument(logger.create_span())
        .await
    }

    /// Frames matching `query`.
    pub async fn search(&self, query: &str, top_k: usize) -> PipelineResult<QueryResults> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::invalid_input("query sentence is empty"));
        }
        if top_k == 0 {
            return Err(PipelineError::invalid_input("top_k must be at least 1"));
        }
        Ok(self.service.find_similar_images(query, top_k).await?)
    }

    pub async fn delete_all(&self) -> PipelineResult<DeleteOutcome> {
        Ok(self.service.delete_all_embeddings().await?)
    }

    /// Match each sentence of `script` to clips in `clips_dir`, in script order.
    ///
    /// A match whose clip is gone from `clips_dir` fails the whole mapping
    /// with a not-found error.
    pub async fn map_script_to_clips(
        &self,
        script: &str,
        clips_dir: &Path,
        top_k: usize,
    ) -> PipelineResult<Vec<SentenceClips>> {
        let sentences = split_sentences(script);
        if sentences.is_empty() {
            return Err(PipelineError::invalid_input("script has no sentences"));
        }

        let mut mapped = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            let results = self.search(&sentence, top_k).await?;
            let mut clips = Vec::with_capacity(results.matches.len());
            for matched in &results.matches {
                let clip = clip_for_match(matched, clips_dir).inspect_err(|e| {
                    warn!(id = %matched.id, error = %e, "Matched clip is unusable");
                })?;
                if !clips.contains(&clip) {
                    clips.push(clip);
                }
            }
            mapped.push(SentenceClips { sentence, clips });
        }
        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelcraft_index::{IndexResult, VectorStore};
    use reelcraft_models::{QueryMatch, VectorRecord, EMBEDDING_DIM};
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_image(&self, _image: &Path) -> IndexResult<Vec<f32>> {
            Ok(vec![1.0; EMBEDDING_DIM])
        }

        async fn embed_text(&self, _text: &str) -> IndexResult<Vec<f32>> {
            Ok(vec![1.0; EMBEDDING_DIM])
        }
    }

    /// Answers every query with the same frames.
    #[derive(Default)]
    struct CannedStore {
        frames: Vec<&'static str>,
        queries: Mutex<usize>,
    }

    #[async_trait]
    impl VectorStore for CannedStore {
        async fn upsert(&self, records: &[VectorRecord]) -> IndexResult<usize> {
            Ok(records.len())
        }

        async fn query(&self, _vector: &[f32], top_k: usize, _filter: Value) -> IndexResult<QueryResults> {
            *self.queries.lock().unwrap() += 1;
            let matches = self
                .frames
                .iter()
                .take(top_k)
                .map(|frame| {
                    let mut metadata = Map::new();
                    metadata.insert("path".into(), json!(format!("data/frames/{frame}")));
                    QueryMatch { id: format!("image-{frame}"), score: 0.8, metadata }
                })
                .collect();
            Ok(QueryResults { matches })
        }

        async fn total_vector_count(&self) -> IndexResult<u64> {
            Ok(0)
        }

        async fn delete_all(&self) -> IndexResult<()> {
            Ok(())
        }
    }

    fn stage(store: Arc<CannedStore>) -> EmbeddingStage {
        EmbeddingStage::new(ImageSearchService::new(Arc::new(FakeEmbedder), store))
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("A robot walks. It stops!  Why? trailing words"),
            ["A robot walks.", "It stops!", "Why?", "trailing words"]
        );
        assert_eq!(split_sentences("Wait... what."), ["Wait.", "what."]);
        assert!(split_sentences(" ... ").is_empty());
    }

    #[tokio::test]
    async fn test_map_script_to_clips() {
        let clips = TempDir::new().unwrap();
        tokio::fs::write(clips.path().join("v-s-001.mp4"), b"x").await.unwrap();
        tokio::fs::write(clips.path().join("v-s-002.mp4"), b"x").await.unwrap();

        let store = Arc::new(CannedStore {
            frames: vec!["f-v-s-002.jpg", "f-v-s-001.jpg", "f-v-s-002.png"],
            ..Default::default()
        });
        let mapped = stage(store.clone())
            .map_script_to_clips("Z is last. A dog barks. Z is last.", clips.path(), 5)
            .await
            .unwrap();

        assert_eq!(*store.queries.lock().unwrap(), 3);
        let sentences: Vec<&str> = mapped.iter().map(|m| m.sentence.as_str()).collect();
        assert_eq!(sentences, ["Z is last.", "A dog barks.", "Z is last."]);
        assert_eq!(
            mapped[0].clips,
            [clips.path().join("v-s-002.mp4"), clips.path().join("v-s-001.mp4")]
        );
    }

    #[tokio::test]
    async fn test_map_script_missing_clip_is_not_found() {
        let clips = TempDir::new().unwrap();
        let store = Arc::new(CannedStore {
            frames: vec!["f-gone-s-003.jpg"],
            ..Default::default()
        });
        let err = stage(store)
            .map_script_to_clips("A man walks.", clips.path(), 5)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("gone-s-003.mp4"));
    }

    #[tokio::test]
    async fn test_search_rejects_empty_query() {
        let store = Arc::new(CannedStore::default());
        let err = stage(store.clone()).search("   ", 5).await.unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(*store.queries.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_frames_without_sidecar() {
        let root = TempDir::new().unwrap();
        let frames = root.path().join("frames");
        tokio::fs::create_dir_all(&frames).await.unwrap();
        tokio::fs::write(frames.join("f-v-s-001.jpg"), b"x").await.unwrap();

        let report = stage(Arc::new(CannedStore::default()))
            .store_frames(&frames, &root.path().join("clips"))
            .await
            .unwrap();
        assert_eq!(report.stored, ["f-v-s-001.jpg"]);
    }
}
