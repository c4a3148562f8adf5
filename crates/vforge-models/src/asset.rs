//! Asset definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// Generate a new random asset ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of media an asset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
    Music,
    Speech,
    Subtitle,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
            AssetKind::Audio => "audio",
            AssetKind::Music => "music",
            AssetKind::Speech => "speech",
            AssetKind::Subtitle => "subtitle",
        }
    }

    /// File extension used for locally stored copies.
    pub fn extension(&self) -> &'static str {
        match self {
            AssetKind::Image => "png",
            AssetKind::Video => "mp4",
            AssetKind::Audio | AssetKind::Music | AssetKind::Speech => "mp3",
            AssetKind::Subtitle => "bin",
        }
    }
}

/// How an asset entered the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetSource {
    Generated,
    Uploaded,
    Stock,
    Template,
}

/// A concrete produced artifact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Asset {
    /// Unique asset ID
    pub id: AssetId,

    /// Media kind
    pub kind: AssetKind,

    /// Provenance
    pub source: AssetSource,

    /// Remote URL, if the artifact lives with the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Local copy, once downloaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,

    /// Cost in USD attributed to this asset
    #[serde(default)]
    pub cost: f64,

    /// Free-form metadata (prompt, model, source_image, motion_prompt,
    /// duration, aspect_ratio, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Raw provider arguments the asset was generated with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_params: Option<Value>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Create a generated asset pointing at a remote URL.
    pub fn generated(kind: AssetKind, url: impl Into<String>) -> Self {
        Self {
            id: AssetId::new(),
            kind,
            source: AssetSource::Generated,
            url: Some(url.into()),
            local_path: None,
            cost: 0.0,
            metadata: Map::new(),
            generation_params: None,
            created_at: Utc::now(),
        }
    }

    /// Create a user-supplied asset backed by a local file.
    pub fn uploaded(kind: AssetKind, local_path: impl Into<PathBuf>) -> Self {
        Self {
            id: AssetId::new(),
            kind,
            source: AssetSource::Uploaded,
            url: None,
            local_path: Some(local_path.into()),
            cost: 0.0,
            metadata: Map::new(),
            generation_params: None,
            created_at: Utc::now(),
        }
    }

    /// Set the attributed cost.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Insert a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Duration recorded in metadata, if any.
    pub fn meta_duration(&self) -> Option<u32> {
        self.metadata
            .get("duration")
            .and_then(Value::as_u64)
            .map(|d| d as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_asset() {
        let asset = Asset::generated(AssetKind::Video, "https://cdn.example/video.mp4")
            .with_cost(0.25)
            .with_meta("duration", json!(5));

        assert_eq!(asset.kind, AssetKind::Video);
        assert_eq!(asset.source, AssetSource::Generated);
        assert_eq!(asset.meta_duration(), Some(5));
        assert!(asset.local_path.is_none());
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(AssetKind::Image.extension(), "png");
        assert_eq!(AssetKind::Video.extension(), "mp4");
        assert_eq!(AssetKind::Music.extension(), "mp3");
        assert_eq!(AssetKind::Speech.extension(), "mp3");
        assert_eq!(AssetKind::Subtitle.extension(), "bin");
    }
}
