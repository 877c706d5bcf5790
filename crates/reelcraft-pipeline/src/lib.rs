//! Stage orchestration for the reel pipeline.
//!
//! Each stage walks one directory sequentially and reports a per-item
//! outcome instead of failing the whole batch:
//! - [`SceneSplitter`]: raw videos to scene clips plus the metadata sidecar
//! - [`FrameExtractor`]: first frame of every clip
//! - [`EmbeddingStage`]: frame vectors, sentence search and script mapping
//! - [`ReelAssembler`]: narrated, captioned reels and the final cut

pub mod assembler;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod outcome;
pub mod splitter;

pub use assembler::{clip_path_in, FfmpegCompositor, ReelAssembler, ReelBatch, ReelCompositor, ReelOutput, FINAL_REEL_NAME};
pub use config::{DetectorBackend, PipelineConfig};
pub use embeddings::{split_sentences, EmbeddingStage, SentenceClips};
pub use error::{PipelineError, PipelineResult};
pub use extractor::{FfmpegFrames, FrameExtractor, FrameSource};
pub use logging::StageLogger;
pub use outcome::{BatchReport, ItemOutcome, ItemReport};
pub use splitter::{SceneSplitter, SplitReport};
