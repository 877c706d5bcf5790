//! Frame store and search on top of an [`Embedder`] and a [`VectorStore`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelcraft_media::fs_utils::{file_name_lossy, list_files};
use reelcraft_models::naming::{clip_name_for_frame, image_vector_id, is_image_file};
use reelcraft_models::{l2_normalize, ClipMetadataMap, QueryMatch, QueryResults, VectorKind, VectorRecord};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::embedder::Embedder;
use crate::error::{IndexError, IndexResult};
use crate::pinecone::VectorStore;

/// Default number of matches per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Outcome of storing one directory of frames.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreReport {
    pub stored: Vec<String>,
    pub failed: Vec<StoreFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreFailure {
    pub file_name: String,
    pub reason: String,
}

/// Result of deleting every vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    AlreadyEmpty,
    Deleted { count: u64 },
}

/// Image embedding store and text-to-image search.
#[derive(Clone)]
pub struct ImageSearchService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

/// Metadata stored with a frame vector.
///
/// Clip fields come from the sidecar when it knows the frame's clip. Nulls
/// are left out since the index rejects them.
pub fn frame_metadata(image: &Path, sidecar: &ClipMetadataMap) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("type".into(), json!(VectorKind::Image.as_str()));
    metadata.insert("path".into(), json!(image.to_string_lossy()));

    let clip = clip_name_for_frame(&file_name_lossy(image));
    if let Some(entry) = sidecar.get(&clip) {
        metadata.insert("clip".into(), json!(clip));
        metadata.insert("duration".into(), json!(entry.duration));
        if let Some(sequence) = entry.sequence {
            metadata.insert("sequence".into(), json!(sequence));
        }
    }
    metadata
}

impl ImageSearchService {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed and upsert every image in `dir`.
    ///
    /// A failing image is logged and reported; the rest still get stored.
    pub async fn store_directory_images(
        &self,
        dir: &Path,
        sidecar: &ClipMetadataMap,
    ) -> IndexResult<StoreReport> {
        let images = list_files(dir, |p| is_image_file(p)).await?;
        info!(dir = %dir.display(), images = images.len(), "Storing frame embeddings");

        let mut report = StoreReport::default();
        for image in images {
            let file_name = file_name_lossy(&image);
            match self.store_image(&image, &file_name, sidecar).await {
                Ok(()) => {
                    info!(image = %file_name, "Stored features");
                    report.stored.push(file_name);
                }
                Err(e) => {
                    warn!(image = %file_name, error = %e, "Failed to store features");
                    report.failed.push(StoreFailure {
                        file_name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn store_image(&self, image: &Path, file_name: &str, sidecar: &ClipMetadataMap) -> IndexResult<()> {
        let values = l2_normalize(self.embedder.embed_image(image).await?);
        let record = VectorRecord {
            id: image_vector_id(file_name),
            values,
            metadata: frame_metadata(image, sidecar),
        };
        self.store.upsert(std::slice::from_ref(&record)).await?;
        Ok(())
    }

    /// Frames most similar to `query`, in index order.
    pub async fn find_similar_images(&self, query: &str, top_k: usize) -> IndexResult<QueryResults> {
        let vector = l2_normalize(self.embedder.embed_text(query).await?);
        let filter = json!({ "type": VectorKind::Image.as_str() });
        let results = self.store.query(&vector, top_k, filter).await?;
        info!(query = %query, matches = results.matches.len(), "Searched frames");
        Ok(results)
    }

    /// Remove every vector unless the index is already empty.
    pub async fn delete_all_embeddings(&self) -> IndexResult<DeleteOutcome> {
        let count = self.store.total_vector_count().await?;
        if count == 0 {
            info!("The index is already empty");
            return Ok(DeleteOutcome::AlreadyEmpty);
        }
        self.store.delete_all().await?;
        info!(count, "Deleted all embeddings");
        Ok(DeleteOutcome::Deleted { count })
    }
}

/// Clip file in `clips_dir` that a frame match was taken from.
pub fn clip_for_match(matched: &QueryMatch, clips_dir: &Path) -> IndexResult<PathBuf> {
    let image = matched
        .image_path()
        .ok_or_else(|| IndexError::invalid_response(format!("match {} has no image path", matched.id)))?;
    let clip = clips_dir.join(clip_name_for_frame(image));
    if clip.is_file() {
        Ok(clip)
    } else {
        Err(IndexError::NotFound(clip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelcraft_models::{ClipMetadata, EMBEDDING_DIM};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_image(&self, image: &Path) -> IndexResult<Vec<f32>> {
            if file_name_lossy(image).contains("corrupt") {
                return Err(IndexError::invalid_response("cannot decode image"));
            }
            Ok(vec![2.0; EMBEDDING_DIM])
        }

        async fn embed_text(&self, _text: &str) -> IndexResult<Vec<f32>> {
            let mut v = vec![0.0; EMBEDDING_DIM];
            v[0] = 3.0;
            v[1] = 4.0;
            Ok(v)
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<VectorRecord>>,
        queries: Mutex<Vec<(Vec<f32>, usize, Value)>>,
        deletes: Mutex<u32>,
    }

    #[async_trait]
    impl VectorStore for MemoryStore {
        async fn upsert(&self, records: &[VectorRecord]) -> IndexResult<usize> {
            self.records.lock().unwrap().extend_from_slice(records);
            Ok(records.len())
        }

        async fn query(&self, vector: &[f32], top_k: usize, filter: Value) -> IndexResult<QueryResults> {
            self.queries.lock().unwrap().push((vector.to_vec(), top_k, filter));
            Ok(QueryResults::default())
        }

        async fn total_vector_count(&self) -> IndexResult<u64> {
            Ok(self.records.lock().unwrap().len() as u64)
        }

        async fn delete_all(&self) -> IndexResult<()> {
            *self.deletes.lock().unwrap() += 1;
            self.records.lock().unwrap().clear();
            Ok(())
        }
    }

    fn service(store: Arc<MemoryStore>) -> ImageSearchService {
        ImageSearchService::new(Arc::new(FakeEmbedder), store)
    }

    #[tokio::test]
    async fn test_store_directory_images() {
        let dir = TempDir::new().unwrap();
        for name in ["f-v-s-001.jpg", "f-v-s-002.PNG", "f-corrupt.jpg", "notes.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        let mut sidecar = ClipMetadataMap::new();
        sidecar.insert("v-s-001.mp4".into(), ClipMetadata { duration: 2.5, sequence: Some(1) });

        let store = Arc::new(MemoryStore::default());
        let report = service(store.clone())
            .store_directory_images(dir.path(), &sidecar)
            .await
            .unwrap();

        assert_eq!(report.stored, ["f-v-s-001.jpg", "f-v-s-002.PNG"]);
        assert_eq!(report.failed.len(), 1);

        let records = store.records.lock().unwrap();
        assert_eq!(records[0].id, "image-f-v-s-001.jpg");
        assert_eq!(records[0].metadata["type"], "image");
        assert_eq!(records[0].metadata["clip"], "v-s-001.mp4");
        assert_eq!(records[0].metadata["sequence"], 1);
        assert!(!records[1].metadata.contains_key("clip"));

        let norm: f32 = records[0].values.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_query_vector_is_normalized_and_filtered() {
        let store = Arc::new(MemoryStore::default());
        service(store.clone()).find_similar_images("a robot", DEFAULT_TOP_K).await.unwrap();

        let queries = store.queries.lock().unwrap();
        let (vector, top_k, filter) = &queries[0];
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);
        assert_eq!(*top_k, 5);
        assert_eq!(filter, &json!({"type": "image"}));
    }

    #[tokio::test]
    async fn test_delete_all_skips_empty_index() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone());

        assert_eq!(svc.delete_all_embeddings().await.unwrap(), DeleteOutcome::AlreadyEmpty);
        assert_eq!(*store.deletes.lock().unwrap(), 0);

        store.upsert(&[VectorRecord { id: "a".into(), values: vec![], metadata: Map::new() }])
            .await
            .unwrap();
        assert_eq!(svc.delete_all_embeddings().await.unwrap(), DeleteOutcome::Deleted { count: 1 });
        assert_eq!(*store.deletes.lock().unwrap(), 1);
    }

    #[test]
    fn test_clip_for_match() {
        let clips = TempDir::new().unwrap();
        std::fs::write(clips.path().join("v-s-001.mp4"), b"x").unwrap();

        let mut metadata = Map::new();
        metadata.insert("path".into(), json!("data/frames/f-v-s-001.jpg"));
        let found = QueryMatch { id: "image-f-v-s-001.jpg".into(), score: 0.9, metadata };
        assert_eq!(clip_for_match(&found, clips.path()).unwrap(), clips.path().join("v-s-001.mp4"));

        let mut metadata = Map::new();
        metadata.insert("path".into(), json!("data/frames/f-gone-s-004.jpg"));
        let missing = QueryMatch { id: "image-f-gone-s-004.jpg".into(), score: 0.5, metadata };
        assert!(matches!(clip_for_match(&missing, clips.path()), Err(IndexError::NotFound(_))));
    }
}
