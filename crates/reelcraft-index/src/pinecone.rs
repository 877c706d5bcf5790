//! Pinecone REST client.
//!
//! The control plane (`api.pinecone.io`) lists, creates and describes
//! indexes; each index then has its own data-plane host for upsert, query,
//! stats and delete.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::counter;
use reelcraft_models::{QueryResults, VectorRecord, EMBEDDING_DIM};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{IndexError, IndexResult};

/// API version pinned on every request.
pub const PINECONE_API_VERSION: &str = "2024-07";

/// Storage and similarity search for embedding vectors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite vectors, returning how many were written.
    async fn upsert(&self, records: &[VectorRecord]) -> IndexResult<usize>;

    /// Nearest neighbours of `vector` matching the metadata `filter`.
    async fn query(&self, vector: &[f32], top_k: usize, filter: Value) -> IndexResult<QueryResults>;

    async fn total_vector_count(&self) -> IndexResult<u64>;

    async fn delete_all(&self) -> IndexResult<()>;
}

/// Pinecone connection and index settings.
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub index_name: String,
    pub cloud: String,
    pub region: String,
    /// Control plane base URL
    pub control_url: String,
    pub dimension: usize,
    pub metric: String,
    pub timeout: Duration,
    /// How long to wait for a new index to become ready
    pub ready_timeout: Duration,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index_name: String::new(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            control_url: "https://api.pinecone.io".to_string(),
            dimension: EMBEDDING_DIM,
            metric: "cosine".to_string(),
            timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(120),
        }
    }
}

impl PineconeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("PINECONE_API_KEY").unwrap_or_default(),
            index_name: std::env::var("PINECONE_INDEX_NAME").unwrap_or_default(),
            cloud: std::env::var("PINECONE_CLOUD").unwrap_or(defaults.cloud),
            region: std::env::var("PINECONE_REGION").unwrap_or(defaults.region),
            control_url: std::env::var("PINECONE_CONTROL_URL").unwrap_or(defaults.control_url),
            ..defaults
        }
    }

    /// Override the credentials with per-request values where given.
    pub fn with_credentials(mut self, api_key: Option<String>, index_name: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.api_key = key;
        }
        if let Some(name) = index_name.filter(|n| !n.is_empty()) {
            self.index_name = name;
        }
        self
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.api_key.is_empty() {
            return Err(IndexError::config("Pinecone API key is not set"));
        }
        if self.index_name.is_empty() {
            return Err(IndexError::config("Pinecone index name is not set"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    filter: Value,
    include_metadata: bool,
    include_values: bool,
}

/// Shared HTTP plumbing for both planes.
#[derive(Debug, Clone)]
struct PineconeHttp {
    http: Client,
    api_key: String,
}

impl PineconeHttp {
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, op: &'static str) -> IndexResult<T> {
        let response = request.send().await?;
        let status = response.status();
        counter!("reelcraft_pinecone_requests_total", "op" => op, "status" => status.as_u16().to_string())
            .increment(1);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::from_http_status(status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::from_value(json!({}))?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Control-plane client.
#[derive(Debug, Clone)]
pub struct PineconeClient {
    inner: PineconeHttp,
    config: PineconeConfig,
}

impl PineconeClient {
    pub fn new(config: PineconeConfig) -> IndexResult<Self> {
        config.validate()?;
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("reelcraft-index/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(IndexError::Network)?;
        Ok(Self {
            inner: PineconeHttp {
                http,
                api_key: config.api_key.clone(),
            },
            config,
        })
    }

    pub fn config(&self) -> &PineconeConfig {
        &self.config
    }

    pub async fn list_indexes(&self) -> IndexResult<Vec<IndexDescription>> {
        let url = format!("{}/indexes", self.config.control_url);
        let list: IndexList = self
            .inner
            .send(self.inner.request(Method::GET, &url), "list_indexes")
            .await?;
        Ok(list.indexes)
    }

    pub async fn describe_index(&self) -> IndexResult<IndexDescription> {
        let url = format!("{}/indexes/{}", self.config.control_url, self.config.index_name);
        self.inner
            .send(self.inner.request(Method::GET, &url), "describe_index")
            .await
    }

    /// Create the serverless index if it does not exist yet.
    ///
    /// Returns whether a new index was created.
    pub async fn create_index_if_absent(&self) -> IndexResult<bool> {
        let exists = self
            .list_indexes()
            .await?
            .iter()
            .any(|i| i.name == self.config.index_name);
        if exists {
            debug!(index = %self.config.index_name, "Pinecone index exists");
            return Ok(false);
        }

        let url = format!("{}/indexes", self.config.control_url);
        let body = json!({
            "name": self.config.index_name,
            "dimension": self.config.dimension,
            "metric": self.config.metric,
            "spec": {"serverless": {"cloud": self.config.cloud, "region": self.config.region}}
        });
        let response = self
            .inner
            .request(Method::POST, &url)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {
                info!(
                    index = %self.config.index_name,
                    dimension = self.config.dimension,
                    metric = %self.config.metric,
                    "Created new Pinecone index"
                );
                Ok(true)
            }
            // Lost a race with another creator.
            StatusCode::CONFLICT => Ok(false),
            s => {
                let text = response.text().await.unwrap_or_default();
                Err(IndexError::from_http_status(s.as_u16(), text))
            }
        }
    }

    /// Make sure the index exists and is ready, then open its data plane.
    pub async fn connect(&self) -> IndexResult<PineconeIndex> {
        self.create_index_if_absent().await?;

        let deadline = Instant::now() + self.config.ready_timeout;
        loop {
            let description = self.describe_index().await?;
            if description.status.ready && !description.host.is_empty() {
                return Ok(PineconeIndex {
                    inner: self.inner.clone(),
                    host: data_plane_url(&description.host),
                    name: description.name,
                });
            }
            if Instant::now() >= deadline {
                return Err(IndexError::NotReady(format!(
                    "{} is {}",
                    self.config.index_name, description.status.state
                )));
            }
            debug!(index = %self.config.index_name, state = %description.status.state, "Waiting for index");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

/// Hosts come back without a scheme.
fn data_plane_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Data-plane client for one index.
#[derive(Debug, Clone)]
pub struct PineconeIndex {
    inner: PineconeHttp,
    host: String,
    name: String,
}

impl PineconeIndex {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl VectorStore for PineconeIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> IndexResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let url = format!("{}/vectors/upsert", self.host);
        let request = self
            .inner
            .request(Method::POST, &url)
            .json(&json!({ "vectors": records }));
        let response: UpsertResponse = self.inner.send(request, "upsert").await?;
        Ok(response.upserted_count)
    }

    async fn query(&self, vector: &[f32], top_k: usize, filter: Value) -> IndexResult<QueryResults> {
        let url = format!("{}/query", self.host);
        let body = QueryRequest {
            vector,
            top_k,
            filter,
            include_metadata: true,
            include_values: false,
        };
        let request = self.inner.request(Method::POST, &url).json(&body);
        self.inner.send(request, "query").await
    }

    async fn total_vector_count(&self) -> IndexResult<u64> {
        let url = format!("{}/describe_index_stats", self.host);
        let request = self.inner.request(Method::POST, &url).json(&json!({}));
        let stats: StatsResponse = self.inner.send(request, "describe_index_stats").await?;
        Ok(stats.total_vector_count)
    }

    async fn delete_all(&self) -> IndexResult<()> {
        let url = format!("{}/vectors/delete", self.host);
        let request = self
            .inner
            .request(Method::POST, &url)
            .json(&json!({ "deleteAll": true }));
        let _: Value = self.inner.send(request, "delete_all").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> PineconeConfig {
        PineconeConfig {
            api_key: "pk".into(),
            index_name: "frames".into(),
            control_url: server.uri(),
            ready_timeout: Duration::from_secs(3),
            ..PineconeConfig::default()
        }
    }

    async fn mount_ready_index(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/indexes/frames"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "frames",
                "host": server.uri(),
                "status": {"ready": true, "state": "Ready"}
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_config_credentials_override() {
        let cfg = PineconeConfig::default().with_credentials(Some("key".into()), None);
        assert_eq!(cfg.api_key, "key");
        assert!(matches!(cfg.validate(), Err(IndexError::Config(_))));

        let cfg = cfg.with_credentials(Some(String::new()), Some("idx".into()));
        assert_eq!(cfg.api_key, "key");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_data_plane_url() {
        assert_eq!(data_plane_url("idx-abc.svc.pinecone.io"), "https://idx-abc.svc.pinecone.io");
        assert_eq!(data_plane_url("http://127.0.0.1:9000/"), "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_connect_creates_missing_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes"))
            .and(header("Api-Key", "pk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indexes": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .and(body_json(json!({
                "name": "frames",
                "dimension": 512,
                "metric": "cosine",
                "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "frames"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_ready_index(&server).await;

        let index = PineconeClient::new(config(&server)).unwrap().connect().await.unwrap();
        assert_eq!(index.name(), "frames");
    }

    #[tokio::test]
    async fn test_existing_index_is_not_recreated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "indexes": [{"name": "frames", "host": "h", "status": {"ready": true}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let created = PineconeClient::new(config(&server))
            .unwrap()
            .create_index_if_absent()
            .await
            .unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn test_query_sends_filter_and_parses_matches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indexes": [{"name": "frames"}]})))
            .mount(&server)
            .await;
        mount_ready_index(&server).await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(header("X-Pinecone-API-Version", PINECONE_API_VERSION))
            .and(body_partial_json(json!({
                "topK": 5,
                "filter": {"type": "image"},
                "includeMetadata": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    {"id": "image-f-a.jpg", "score": 0.91, "metadata": {"type": "image", "path": "data/frames/f-a.jpg"}},
                    {"id": "image-f-b.jpg", "score": 0.42}
                ],
                "namespace": ""
            })))
            .mount(&server)
            .await;

        let index = PineconeClient::new(config(&server)).unwrap().connect().await.unwrap();
        let results = index
            .query(&[0.0; EMBEDDING_DIM], 5, json!({"type": "image"}))
            .await
            .unwrap();

        assert_eq!(results.matches.len(), 2);
        assert_eq!(results.matches[0].image_path(), Some("data/frames/f-a.jpg"));
        assert!(results.matches[1].metadata.is_empty());
    }

    #[tokio::test]
    async fn test_stats_and_delete_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"indexes": [{"name": "frames"}]})))
            .mount(&server)
            .await;
        mount_ready_index(&server).await;
        Mock::given(method("POST"))
            .and(path("/describe_index_stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dimension": 512, "totalVectorCount": 7, "namespaces": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/delete"))
            .and(body_json(json!({"deleteAll": true})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let index = PineconeClient::new(config(&server)).unwrap().connect().await.unwrap();
        assert_eq!(index.total_vector_count().await.unwrap(), 7);
        index.delete_all().await.unwrap();
    }
}
