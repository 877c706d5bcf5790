//! Shared data models for the Reelcraft pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Scene clip metadata and the per-directory sidecar
//! - Word timings produced by caption alignment
//! - Embedding vectors and similarity matches
//! - Reel scripts and encoding defaults
//! - File naming rules shared by every stage

pub mod clip;
pub mod encoding;
pub mod naming;
pub mod reel;
pub mod timing;
pub mod vector;

pub use clip::{ClipMetadata, ClipMetadataMap, SceneBoundary, SidecarPolicy};
pub use encoding::EncodingConfig;
pub use reel::ReelScript;
pub use timing::WordTiming;
pub use vector::{l2_normalize, QueryMatch, QueryResults, VectorKind, VectorRecord, EMBEDDING_DIM};
