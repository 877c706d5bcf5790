//! Router tests against in-memory collaborators.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use reelcraft_api::{create_router, ApiConfig, AppState, IndexConnector};
use reelcraft_index::{Embedder, ImageSearchService, IndexError, IndexResult, VectorStore};
use reelcraft_models::{QueryMatch, QueryResults, VectorRecord, EMBEDDING_DIM};
use reelcraft_pipeline::{EmbeddingStage, FrameExtractor, PipelineConfig, PipelineError, PipelineResult, SceneSplitter};
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use tower::ServiceExt;

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

/// Every query matches the first frames of two clips.
#[derive(Default)]
struct FakeStore {
    upserted: Mutex<Vec<VectorRecord>>,
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn upsert(&self, records: &[VectorRecord]) -> IndexResult<usize> {
        self.upserted.lock().unwrap().extend_from_slice(records);
        Ok(records.len())
    }

    async fn query(&self, _vector: &[f32], _top_k: usize, _filter: Value) -> IndexResult<QueryResults> {
        let matches = ["f-v-s-001.jpg", "f-v-s-002.jpg"]
            .into_iter()
            .map(|frame| {
                let mut metadata = Map::new();
                metadata.insert("path".into(), json!(format!("data/frames/{frame}")));
                QueryMatch {
                    id: format!("image-{frame}"),
                    score: 0.9,
                    metadata,
                }
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

/// Requires an api key, like the real index.
struct FakeConnector {
    store: Arc<FakeStore>,
}

#[async_trait]
impl IndexConnector for FakeConnector {
    async fn connect(&self, api_key: Option<String>, _index_name: Option<String>) -> PipelineResult<EmbeddingStage> {
        if api_key.is_none() {
            return Err(PipelineError::from(IndexError::config("Pinecone API key is not set")));
        }
        Ok(EmbeddingStage::new(ImageSearchService::new(
            Arc::new(FakeEmbedder),
            self.store.clone(),
        )))
    }
}

fn test_state(root: &Path, rate_limit_rps: u32) -> AppState {
    test_state_with_store(root, rate_limit_rps, Arc::new(FakeStore::default()))
}

fn test_state_with_store(root: &Path, rate_limit_rps: u32, store: Arc<FakeStore>) -> AppState {
    let pipeline = PipelineConfig::with_data_dir(root);
    AppState {
        config: ApiConfig {
            rate_limit_rps,
            ..ApiConfig::default()
        },
        splitter: SceneSplitter::from_config(&pipeline),
        extractor: FrameExtractor::default(),
        pipeline: Arc::new(pipeline),
        index: Arc::new(FakeConnector { store }),
        assembler: None,
    }
}

fn app(root: &Path) -> Router {
    create_router(test_state(root, 1000), None)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let root = TempDir::new().unwrap();
    let response = app(root.path())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let root = TempDir::new().unwrap();
    let response = app(root.path())
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_metrics_disabled_is_not_found() {
    let root = TempDir::new().unwrap();
    let response = app(root.path())
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_extract_images_empty_clips_dir() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("clips")).unwrap();

    let (status, body) = send(app(root.path()), post_json("/extract_images", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "extract");
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn test_extract_images_missing_clips_dir() {
    let root = TempDir::new().unwrap();
    let (status, body) = send(app(root.path()), post_json("/extract_images", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert!(body["detail"].as_str().unwrap().contains("clips"));
}

#[tokio::test]
async fn test_retrieve_embeddings() {
    let root = TempDir::new().unwrap();
    let request = post_json(
        "/retrieve_embeddings",
        json!({"api_key": "pk", "index_name": "reels", "query_sentence": "a man walking"}),
    );
    let (status, body) = send(app(root.path()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matches"][0]["id"], "image-f-v-s-001.jpg");
}

#[tokio::test]
async fn test_retrieve_embeddings_validation() {
    let root = TempDir::new().unwrap();
    let request = post_json("/retrieve_embeddings", json!({"api_key": "pk", "query_sentence": ""}));
    let (status, body) = send(app(root.path()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_missing_index_credentials_is_bad_request() {
    let root = TempDir::new().unwrap();
    let request = post_json("/retrieve_embeddings", json!({"query_sentence": "a dog"}));
    let (status, body) = send(app(root.path()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("API key"));
}

#[tokio::test]
async fn test_store_embeddings_rejects_escaping_dir() {
    let root = TempDir::new().unwrap();
    let request = post_json("/store_embeddings", json!({"api_key": "pk", "image_dir": "../../etc"}));
    let (status, _) = send(app(root.path()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_store_embeddings_reads_sidecar_from_requested_clips_dir() {
    let root = TempDir::new().unwrap();
    let frames = root.path().join("frames");
    let batch = root.path().join("batch1");
    std::fs::create_dir_all(&frames).unwrap();
    std::fs::create_dir_all(&batch).unwrap();
    std::fs::write(frames.join("f-v-s-001.jpg"), b"x").unwrap();
    std::fs::write(
        batch.join("metadata.json"),
        json!({"v-s-001.mp4": {"duration": 2.5, "sequence": 1}}).to_string(),
    )
    .unwrap();

    let store = Arc::new(FakeStore::default());
    let app = create_router(test_state_with_store(root.path(), 1000, store.clone()), None);
    let request = post_json("/store_embeddings", json!({"api_key": "pk", "clips_dir": "batch1"}));
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stored"], json!(["f-v-s-001.jpg"]));

    let upserted = store.upserted.lock().unwrap();
    assert_eq!(upserted[0].metadata["clip"], "v-s-001.mp4");
    assert_eq!(upserted[0].metadata["duration"], 2.5);
    assert_eq!(upserted[0].metadata["sequence"], 1);
}

#[tokio::test]
async fn test_map_script_keeps_script_order() {
    let root = TempDir::new().unwrap();
    let clips = root.path().join("clips");
    std::fs::create_dir_all(&clips).unwrap();
    std::fs::write(clips.join("v-s-001.mp4"), b"x").unwrap();
    std::fs::write(clips.join("v-s-002.mp4"), b"x").unwrap();

    let request = post_json(
        "/map_script",
        json!({"api_key": "pk", "script": "Zebras run. A man walks. Zebras run."}),
    );
    let (status, body) = send(app(root.path()), request).await;
    assert_eq!(status, StatusCode::OK);

    let sentences = body["sentences"].as_array().unwrap();
    let order: Vec<&str> = sentences.iter().map(|s| s["sentence"].as_str().unwrap()).collect();
    assert_eq!(order, ["Zebras run.", "A man walks.", "Zebras run."]);
    let walks = sentences[1]["clips"].as_array().unwrap();
    assert_eq!(walks.len(), 2);
    assert!(walks[0].as_str().unwrap().ends_with("v-s-001.mp4"));
}

#[tokio::test]
async fn test_map_script_missing_clip_is_not_found() {
    let root = TempDir::new().unwrap();
    let clips = root.path().join("clips");
    std::fs::create_dir_all(&clips).unwrap();
    std::fs::write(clips.join("v-s-001.mp4"), b"x").unwrap();

    let request = post_json("/map_script", json!({"api_key": "pk", "script": "A man walks."}));
    let (status, body) = send(app(root.path()), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert!(body["detail"].as_str().unwrap().contains("v-s-002.mp4"));
}

#[tokio::test]
async fn test_create_reels_rejects_clip_outside_clips_dir() {
    let root = TempDir::new().unwrap();
    for clip in ["/etc/hosts", "../secret.mp4"] {
        let request = post_json(
            "/create_reels",
            json!({"reels": [{"clips": [clip], "script": "hello world"}]}),
        );
        let (status, body) = send(app(root.path()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{clip}");
        assert!(body["detail"].as_str().unwrap().contains("clips directory"));
    }
}

#[tokio::test]
async fn test_create_reels_without_speech_is_internal_error() {
    let root = TempDir::new().unwrap();
    let request = post_json(
        "/create_reels",
        json!({"reels": [{"clips": ["v-s-001.mp4"], "script": "hello world"}]}),
    );
    let (status, body) = send(app(root.path()), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("speech"));
}

#[tokio::test]
async fn test_create_reels_requires_reels() {
    let root = TempDir::new().unwrap();
    let (status, _) = send(app(root.path()), post_json("/create_reels", json!({"reels": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_video_rejects_bad_url() {
    let root = TempDir::new().unwrap();
    let (status, _) = send(app(root.path()), post_json("/download_video", json!({"url": "not a url"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clip_videos_rejects_non_video_upload() {
    let root = TempDir::new().unwrap();
    let boundary = "reelcraftboundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"video_files\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         hello\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/clip_videos")
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(app(root.path()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("notes.txt"));
}

#[tokio::test]
async fn test_rate_limiting() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("clips")).unwrap();
    let app = create_router(test_state(root.path(), 1), None);

    let request = || {
        Request::builder()
            .method("POST")
            .uri("/extract_images")
            .header("x-forwarded-for", "192.168.1.100")
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}
