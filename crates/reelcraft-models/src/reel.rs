//! Reel scripts.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Candidate clips paired with the narration they should carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReelScript {
    /// Clip paths in playback order
    pub clips: Vec<PathBuf>,
    /// Narration text
    pub script: String,
}

impl ReelScript {
    /// Script split on whitespace.
    pub fn words(&self) -> Vec<&str> {
        self.script.split_whitespace().collect()
    }
}
