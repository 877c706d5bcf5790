//! Scene clip metadata.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Duration and scene number recorded for one split clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipMetadata {
    /// Clip duration in seconds
    pub duration: f64,
    /// Scene number parsed from the `s-<digits>` part of the filename
    pub sequence: Option<u64>,
}

/// Clip filename -> metadata, as persisted in the sidecar.
pub type ClipMetadataMap = BTreeMap<String, ClipMetadata>;

/// How a directory pass writes its sidecar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SidecarPolicy {
    /// Overwrite the sidecar with this pass only.
    #[default]
    Replace,
    /// Keep entries from earlier passes; this pass wins on conflicts.
    Merge,
}

impl SidecarPolicy {
    /// Apply the policy to an existing map and the result of a new pass.
    pub fn apply(self, existing: ClipMetadataMap, pass: ClipMetadataMap) -> ClipMetadataMap {
        match self {
            SidecarPolicy::Replace => pass,
            SidecarPolicy::Merge => {
                let mut merged = existing;
                merged.extend(pass);
                merged
            }
        }
    }
}

impl std::str::FromStr for SidecarPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(SidecarPolicy::Replace),
            "merge" => Ok(SidecarPolicy::Merge),
            other => Err(format!("unknown sidecar policy: {other}")),
        }
    }
}

/// A detected scene inside a source video, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneBoundary {
    pub start: f64,
    pub end: f64,
}

impl SceneBoundary {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}
