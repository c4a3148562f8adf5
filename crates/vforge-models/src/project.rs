//! Project and scene definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::asset::{Asset, AssetId, AssetKind};
use crate::pricing::round_cost;

/// Unique identifier for a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SceneId(pub String);

impl SceneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Draft,
    InProgress,
    Rendering,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Rendering => "rendering",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        }
    }
}

/// An ordered segment of the project timeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Unique scene ID
    pub id: SceneId,

    /// Dense position within the project, unique per project
    pub order: usize,

    /// Duration in seconds (one of the provider-valid video lengths)
    pub duration: u32,

    /// What happens in this scene
    pub description: String,

    /// Assets owned by the scene (at most one video)
    #[serde(default)]
    pub assets: Vec<Asset>,

    /// References into the project's global audio tracks
    #[serde(default)]
    pub audio_tracks: Vec<AssetId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scene {
    pub fn new(description: impl Into<String>, duration: u32) -> Self {
        let now = Utc::now();
        Self {
            id: SceneId::new(),
            order: 0,
            duration,
            description: description.into(),
            assets: Vec::new(),
            audio_tracks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The scene's video asset, if one is attached.
    pub fn video_asset(&self) -> Option<&Asset> {
        self.assets.iter().find(|a| a.kind == AssetKind::Video)
    }
}

/// A complete video project.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoProject {
    /// Unique project ID
    pub id: ProjectId,

    /// Project title
    pub title: String,

    /// Target platform key (see the platform registry)
    pub platform: String,

    /// Aspect ratio, defaulted from the platform
    pub aspect_ratio: String,

    /// Target duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<u32>,

    /// Actual duration derived from scenes
    #[serde(default)]
    pub actual_duration: u32,

    /// Ordered scenes
    #[serde(default)]
    pub scenes: Vec<Scene>,

    /// Project-wide audio tracks (music, narration)
    #[serde(default)]
    pub global_audio_tracks: Vec<Asset>,

    /// Optional script / narration text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Total cost derived from all assets, 3 decimals
    #[serde(default)]
    pub total_cost: f64,

    #[serde(default)]
    pub status: ProjectStatus,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoProject {
    pub fn new(title: impl Into<String>, platform: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::new(),
            title: title.into(),
            platform: platform.into(),
            aspect_ratio: "16:9".to_string(),
            target_duration: None,
            actual_duration: 0,
            scenes: Vec::new(),
            global_audio_tracks: Vec::new(),
            script: None,
            total_cost: 0.0,
            status: ProjectStatus::Draft,
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of scene durations.
    pub fn calculate_duration(&self) -> u32 {
        self.scenes.iter().map(|s| s.duration).sum()
    }

    /// Sum of asset costs across scenes and global tracks, 3 decimals.
    pub fn calculate_cost(&self) -> f64 {
        let scene_cost: f64 = self
            .scenes
            .iter()
            .flat_map(|s| s.assets.iter())
            .map(|a| a.cost)
            .sum();
        let audio_cost: f64 = self.global_audio_tracks.iter().map(|a| a.cost).sum();
        round_cost(scene_cost + audio_cost)
    }

    /// Re-derive `total_cost` and `actual_duration` after a mutation.
    pub fn recompute(&mut self) {
        self.total_cost = self.calculate_cost();
        self.actual_duration = self.calculate_duration();
        self.updated_at = Utc::now();
    }

    /// File name of the assembled output, without extension.
    pub fn output_stem(&self) -> String {
        format!("{}_{}", sanitize_title(&self.title), self.platform)
    }
}

/// Replace whitespace so the title is usable in a file name.
pub fn sanitize_title(title: &str) -> String {
    title.trim().replace(char::is_whitespace, "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Asset, AssetKind};

    #[test]
    fn test_cost_and_duration_derivation() {
        let mut project = VideoProject::new("Demo", "tiktok");
        let mut scene = Scene::new("intro", 5);
        scene
            .assets
            .push(Asset::generated(AssetKind::Video, "https://x/v.mp4").with_cost(0.25));
        project.scenes.push(scene);
        project
            .global_audio_tracks
            .push(Asset::generated(AssetKind::Music, "https://x/m.mp3").with_cost(0.4));

        project.recompute();

        assert_eq!(project.actual_duration, 5);
        assert_eq!(project.total_cost, 0.65);
    }

    #[test]
    fn test_cost_rounding_to_three_decimals() {
        let mut project = VideoProject::new("Demo", "youtube");
        for _ in 0..3 {
            project
                .global_audio_tracks
                .push(Asset::generated(AssetKind::Music, "https://x/m.mp3").with_cost(0.0451));
        }
        project.recompute();
        assert_eq!(project.total_cost, 0.135);
    }

    #[test]
    fn test_output_stem() {
        let project = VideoProject::new("My Launch Video", "tiktok");
        assert_eq!(project.output_stem(), "My_Launch_Video_tiktok");
    }

    #[test]
    fn test_video_asset_lookup() {
        let mut scene = Scene::new("intro", 5);
        assert!(scene.video_asset().is_none());
        scene
            .assets
            .push(Asset::generated(AssetKind::Image, "https://x/i.png"));
        scene
            .assets
            .push(Asset::generated(AssetKind::Video, "https://x/v.mp4"));
        assert_eq!(scene.video_asset().unwrap().kind, AssetKind::Video);
    }
}
