//! Frame embedding storage and text search.
//!
//! - HTTP client for the image/text embedding service
//! - Pinecone control-plane and data-plane clients
//! - Directory store, filtered search, delete-all and match-to-clip lookup

pub mod embedder;
pub mod error;
pub mod pinecone;
pub mod service;

pub use embedder::{Embedder, EmbeddingClientConfig, HttpEmbedder};
pub use error::{IndexError, IndexResult};
pub use pinecone::{PineconeClient, PineconeConfig, PineconeIndex, VectorStore};
pub use service::{clip_for_match, DeleteOutcome, ImageSearchService, StoreReport, DEFAULT_TOP_K};
