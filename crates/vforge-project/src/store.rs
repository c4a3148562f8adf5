//! The project store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use vforge_models::{
    Asset, AssetKind, ProjectId, ProjectStatus, Scene, SceneId, VideoProject,
};

use crate::error::{ProjectError, ProjectResult};

/// Parameters for creating a project.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub platform: String,
    pub aspect_ratio: String,
    pub target_duration: Option<u32>,
    pub script: Option<String>,
}

/// Field updates applied by `update`. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub status: Option<ProjectStatus>,
    pub target_duration: Option<u32>,
    pub script: Option<String>,
    pub aspect_ratio: Option<String>,
}

#[derive(Default)]
struct StoreInner {
    projects: HashMap<ProjectId, VideoProject>,
    current: Option<ProjectId>,
}

/// In-memory graph of projects, scenes and assets.
///
/// All operations are synchronous and serialized by a single mutex; the
/// derived fields (`total_cost`, `actual_duration`) are recomputed inside
/// the lock so readers always observe them consistently.
pub struct ProjectStore {
    inner: Mutex<StoreInner>,
}

impl Default for ProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Create a project and make it current.
    pub fn create(&self, new: NewProject) -> VideoProject {
        let mut project = VideoProject::new(new.title, new.platform);
        project.aspect_ratio = new.aspect_ratio;
        project.target_duration = new.target_duration;
        project.script = new.script;

        let mut inner = self.lock();
        inner.current = Some(project.id.clone());
        inner.projects.insert(project.id.clone(), project.clone());
        info!(project_id = %project.id, title = %project.title, "project created");
        project
    }

    /// Get a snapshot of a project.
    pub fn get(&self, project_id: &ProjectId) -> ProjectResult<VideoProject> {
        self.lock()
            .projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| ProjectError::ProjectNotFound(project_id.to_string()))
    }

    /// The current project, if one is set.
    pub fn current(&self) -> Option<VideoProject> {
        let inner = self.lock();
        let id = inner.current.as_ref()?;
        inner.projects.get(id).cloned()
    }

    /// All projects, most recently created first.
    pub fn list(&self) -> Vec<VideoProject> {
        let mut projects: Vec<VideoProject> = self.lock().projects.values().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        projects
    }

    /// Apply field updates to a project.
    pub fn update(
        &self,
        project_id: &ProjectId,
        update: ProjectUpdate,
    ) -> ProjectResult<VideoProject> {
        let mut inner = self.lock();
        let project = inner
            .projects
            .get_mut(project_id)
            .ok_or_else(|| ProjectError::ProjectNotFound(project_id.to_string()))?;

        if let Some(title) = update.title {
            project.title = title;
        }
        if let Some(status) = update.status {
            project.status = status;
        }
        if let Some(target) = update.target_duration {
            project.target_duration = Some(target);
        }
        if let Some(script) = update.script {
            project.script = Some(script);
        }
        if let Some(aspect_ratio) = update.aspect_ratio {
            project.aspect_ratio = aspect_ratio;
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    /// Add a scene. Appends unless `position` is given; positions past the
    /// end are rejected. Orders stay dense and unique.
    pub fn add_scene(
        &self,
        project_id: &ProjectId,
        description: impl Into<String>,
        duration: u32,
        position: Option<usize>,
    ) -> ProjectResult<Scene> {
        let mut inner = self.lock();
        let project = inner
            .projects
            .get_mut(project_id)
            .ok_or_else(|| ProjectError::ProjectNotFound(project_id.to_string()))?;

        let scene_count = project.scenes.len();
        let index = match position {
            Some(p) if p > scene_count => {
                return Err(ProjectError::InvalidPosition {
                    position: p,
                    scene_count,
                })
            }
            Some(p) => p,
            None => scene_count,
        };

        let scene = Scene::new(description, duration);
        project.scenes.insert(index, scene.clone());
        for (order, s) in project.scenes.iter_mut().enumerate() {
            s.order = order;
        }
        project.recompute();

        debug!(project_id = %project_id, scene_id = %scene.id, order = index, "scene added");
        // Return the stored copy so the caller sees the assigned order.
        Ok(project.scenes[index].clone())
    }

    /// Attach a generated asset to a scene.
    ///
    /// A scene owns at most one video asset; attaching a second video
    /// replaces the first. If the asset metadata carries a duration that
    /// differs from the scene's, the scene is brought in line with the
    /// produced clip.
    pub fn attach_scene_asset(
        &self,
        project_id: &ProjectId,
        scene_id: &SceneId,
        asset: Asset,
    ) -> ProjectResult<()> {
        let mut inner = self.lock();
        let project = inner
            .projects
            .get_mut(project_id)
            .ok_or_else(|| ProjectError::ProjectNotFound(project_id.to_string()))?;
        let scene = project
            .scenes
            .iter_mut()
            .find(|s| &s.id == scene_id)
            .ok_or_else(|| ProjectError::SceneNotFound(scene_id.to_string()))?;

        if asset.kind == AssetKind::Video {
            if let Some(previous) = scene.assets.iter().position(|a| a.kind == AssetKind::Video)
            {
                warn!(scene_id = %scene_id, "replacing existing video asset");
                scene.assets.remove(previous);
            }
            if let Some(duration) = asset.meta_duration() {
                if scene.duration != duration {
                    debug!(
                        scene_id = %scene_id,
                        from = scene.duration,
                        to = duration,
                        "syncing scene duration to generated clip"
                    );
                    scene.duration = duration;
                }
            }
        }

        let asset_id = asset.id.clone();
        scene.assets.push(asset);
        scene.updated_at = Utc::now();
        project.recompute();

        info!(project_id = %project_id, scene_id = %scene_id, asset_id = %asset_id, "asset attached");
        Ok(())
    }

    /// Add a project-wide audio track (music, narration).
    pub fn add_global_audio_track(
        &self,
        project_id: &ProjectId,
        asset: Asset,
    ) -> ProjectResult<()> {
        let mut inner = self.lock();
        let project = inner
            .projects
            .get_mut(project_id)
            .ok_or_else(|| ProjectError::ProjectNotFound(project_id.to_string()))?;

        info!(project_id = %project_id, asset_id = %asset.id, kind = asset.kind.as_str(), "global audio track added");
        project.global_audio_tracks.push(asset);
        project.recompute();
        Ok(())
    }

    /// Reference a global audio track from a scene.
    pub fn link_scene_audio(
        &self,
        project_id: &ProjectId,
        scene_id: &SceneId,
        asset_id: vforge_models::AssetId,
    ) -> ProjectResult<()> {
        let mut inner = self.lock();
        let project = inner
            .projects
            .get_mut(project_id)
            .ok_or_else(|| ProjectError::ProjectNotFound(project_id.to_string()))?;
        let scene = project
            .scenes
            .iter_mut()
            .find(|s| &s.id == scene_id)
            .ok_or_else(|| ProjectError::SceneNotFound(scene_id.to_string()))?;
        scene.audio_tracks.push(asset_id);
        scene.updated_at = Utc::now();
        Ok(())
    }

    /// Record the local path of a downloaded asset, wherever it lives
    /// (scene assets or global tracks).
    pub fn update_asset_local_path(
        &self,
        project_id: &ProjectId,
        asset_id: &vforge_models::AssetId,
        local_path: std::path::PathBuf,
    ) -> ProjectResult<bool> {
        let mut inner = self.lock();
        let project = inner
            .projects
            .get_mut(project_id)
            .ok_or_else(|| ProjectError::ProjectNotFound(project_id.to_string()))?;

        let asset = project
            .scenes
            .iter_mut()
            .flat_map(|s| s.assets.iter_mut())
            .chain(project.global_audio_tracks.iter_mut())
            .find(|a| &a.id == asset_id);

        match asset {
            Some(asset) => {
                asset.local_path = Some(local_path);
                project.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Set a metadata entry on a project.
    pub fn set_metadata(
        &self,
        project_id: &ProjectId,
        key: impl Into<String>,
        value: Value,
    ) -> ProjectResult<()> {
        let mut inner = self.lock();
        let project = inner
            .projects
            .get_mut(project_id)
            .ok_or_else(|| ProjectError::ProjectNotFound(project_id.to_string()))?;
        project.metadata.insert(key.into(), value);
        project.updated_at = Utc::now();
        Ok(())
    }

    /// Drop every project and clear the current pointer.
    pub fn clear_all(&self) -> usize {
        let mut inner = self.lock();
        let count = inner.projects.len();
        inner.projects.clear();
        inner.current = None;
        info!(cleared = count, "all projects cleared");
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // Recover the inner state if a writer panicked mid-mutation.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vforge_models::AssetSource;

    fn new_project(store: &ProjectStore) -> VideoProject {
        store.create(NewProject {
            title: "Demo".to_string(),
            platform: "tiktok".to_string(),
            aspect_ratio: "9:16".to_string(),
            target_duration: Some(30),
            script: None,
        })
    }

    #[test]
    fn test_create_sets_current() {
        let store = ProjectStore::new();
        assert!(store.current().is_none());
        let project = new_project(&store);
        assert_eq!(store.current().unwrap().id, project.id);

        let second = new_project(&store);
        assert_eq!(store.current().unwrap().id, second.id);
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_add_scene_appends_with_dense_orders() {
        let store = ProjectStore::new();
        let project = new_project(&store);

        let s0 = store.add_scene(&project.id, "intro", 5, None).unwrap();
        let s1 = store.add_scene(&project.id, "middle", 10, None).unwrap();
        assert_eq!(s0.order, 0);
        assert_eq!(s1.order, 1);

        // Insert at the front; every order shifts and stays dense.
        let s_front = store.add_scene(&project.id, "hook", 5, Some(0)).unwrap();
        assert_eq!(s_front.order, 0);
        let stored = store.get(&project.id).unwrap();
        let orders: Vec<usize> = stored.scenes.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(stored.scenes[1].description, "intro");
        assert_eq!(stored.actual_duration, 20);
    }

    #[test]
    fn test_add_scene_rejects_position_past_end() {
        let store = ProjectStore::new();
        let project = new_project(&store);
        store.add_scene(&project.id, "intro", 5, None).unwrap();

        let err = store
            .add_scene(&project.id, "tail", 5, Some(3))
            .unwrap_err();
        assert!(matches!(
            err,
            ProjectError::InvalidPosition {
                position: 3,
                scene_count: 1
            }
        ));

        // Position == len is an append.
        let ok = store.add_scene(&project.id, "tail", 5, Some(1)).unwrap();
        assert_eq!(ok.order, 1);
    }

    #[test]
    fn test_attach_video_asset_updates_totals_and_duration() {
        let store = ProjectStore::new();
        let project = new_project(&store);
        let scene = store.add_scene(&project.id, "intro", 5, None).unwrap();

        let asset = Asset::generated(AssetKind::Video, "https://cdn/v.mp4")
            .with_cost(0.25)
            .with_meta("duration", json!(10));
        store
            .attach_scene_asset(&project.id, &scene.id, asset)
            .unwrap();

        let stored = store.get(&project.id).unwrap();
        assert_eq!(stored.total_cost, 0.25);
        // Scene duration synced to the produced clip.
        assert_eq!(stored.scenes[0].duration, 10);
        assert_eq!(stored.actual_duration, 10);
    }

    #[test]
    fn test_second_video_replaces_first() {
        let store = ProjectStore::new();
        let project = new_project(&store);
        let scene = store.add_scene(&project.id, "intro", 5, None).unwrap();

        for url in ["https://cdn/a.mp4", "https://cdn/b.mp4"] {
            store
                .attach_scene_asset(
                    &project.id,
                    &scene.id,
                    Asset::generated(AssetKind::Video, url).with_cost(0.25),
                )
                .unwrap();
        }

        let stored = store.get(&project.id).unwrap();
        let videos: Vec<&Asset> = stored.scenes[0]
            .assets
            .iter()
            .filter(|a| a.kind == AssetKind::Video)
            .collect();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].url.as_deref(), Some("https://cdn/b.mp4"));
        assert_eq!(stored.total_cost, 0.25);
    }

    #[test]
    fn test_attach_to_missing_scene() {
        let store = ProjectStore::new();
        let project = new_project(&store);
        let err = store
            .attach_scene_asset(
                &project.id,
                &SceneId::from_string("nope"),
                Asset::generated(AssetKind::Video, "https://cdn/v.mp4"),
            )
            .unwrap_err();
        assert!(matches!(err, ProjectError::SceneNotFound(_)));
    }

    #[test]
    fn test_global_audio_track_counts_into_cost() {
        let store = ProjectStore::new();
        let project = new_project(&store);
        let track = Asset::generated(AssetKind::Music, "https://cdn/m.mp3").with_cost(0.4);
        store.add_global_audio_track(&project.id, track).unwrap();

        let stored = store.get(&project.id).unwrap();
        assert_eq!(stored.global_audio_tracks.len(), 1);
        assert_eq!(stored.total_cost, 0.4);
        assert_eq!(stored.global_audio_tracks[0].source, AssetSource::Generated);
    }

    #[test]
    fn test_update_and_clear() {
        let store = ProjectStore::new();
        let project = new_project(&store);

        let updated = store
            .update(
                &project.id,
                ProjectUpdate {
                    status: Some(ProjectStatus::Rendering),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, ProjectStatus::Rendering);

        assert_eq!(store.clear_all(), 1);
        assert!(store.current().is_none());
        assert!(store.get(&project.id).is_err());
    }
}
