//! Embedding vectors and similarity matches.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dimension of image and text embeddings.
pub const EMBEDDING_DIM: usize = 512;

/// Discriminator stored in vector metadata under `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VectorKind {
    Image,
}

impl VectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorKind::Image => "image",
        }
    }
}

/// A vector ready for upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// A single similarity match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl QueryMatch {
    /// Stored image path, if present in metadata.
    pub fn image_path(&self) -> Option<&str> {
        self.metadata.get("path").and_then(Value::as_str)
    }
}

/// Matches in the order returned by the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryResults {
    pub matches: Vec<QueryMatch>,
}

/// Scale a vector to unit L2 norm. A zero vector is returned unchanged.
pub fn l2_normalize(mut values: Vec<f32>) -> Vec<f32> {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
    values
}
