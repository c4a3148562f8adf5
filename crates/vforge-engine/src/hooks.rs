//! Completion hooks: materialize finished jobs into project assets.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use vforge_fal::{
    extract_audio_url, extract_image_url, extract_speech_duration_ms, extract_video_url,
};
use vforge_models::{Asset, AssetKind};
use vforge_project::ProjectStore;
use vforge_queue::{CompletionHook, GenerationJob, HookError, HookResult};
use vforge_storage::AssetStorage;

/// Metadata keys copied from the job onto the produced asset.
const CARRIED_METADATA: &[&str] = &[
    "prompt",
    "model",
    "source_image",
    "motion_prompt",
    "duration",
    "aspect_ratio",
    "text",
    "voice",
    "track_type",
    "volume",
];

/// Hook that turns a completed generation into a stored, attached asset.
///
/// Video and image results attach to the job's scene; music and speech
/// results join the project's global audio tracks. The job completes even
/// if post-processing fails; the queue logs the error.
pub struct AssetCompletionHook {
    kind: AssetKind,
    projects: Arc<ProjectStore>,
    storage: Arc<AssetStorage>,
}

impl AssetCompletionHook {
    pub fn new(kind: AssetKind, projects: Arc<ProjectStore>, storage: Arc<AssetStorage>) -> Self {
        Self {
            kind,
            projects,
            storage,
        }
    }

    fn extract_url<'a>(&self, result: &'a Value) -> Option<&'a str> {
        match self.kind {
            AssetKind::Video => extract_video_url(result),
            AssetKind::Image => extract_image_url(result),
            AssetKind::Audio | AssetKind::Music | AssetKind::Speech => extract_audio_url(result),
            AssetKind::Subtitle => None,
        }
    }
}

#[async_trait]
impl CompletionHook for AssetCompletionHook {
    async fn on_completed(&self, job: &GenerationJob, result: &Value) -> HookResult<()> {
        let url = self
            .extract_url(result)
            .ok_or(HookError::MissingArtifactUrl)?
            .to_string();

        let cost = job
            .metadata
            .get("cost")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let mut asset = Asset::generated(self.kind, &url).with_cost(cost);
        for key in CARRIED_METADATA {
            if let Some(value) = job.metadata.get(*key) {
                asset.metadata.insert((*key).to_string(), value.clone());
            }
        }
        if self.kind == AssetKind::Speech {
            if let Some(ms) = extract_speech_duration_ms(result) {
                asset.metadata.insert("duration_ms".to_string(), ms.into());
                asset
                    .metadata
                    .insert("duration".to_string(), ms.div_ceil(1000).into());
            }
        }
        asset.generation_params = Some(Value::Object(job.metadata.clone()));

        let Some(project_id) = &job.project_id else {
            // Nothing to attach; the caller holds the result URL.
            return Ok(());
        };

        match self
            .storage
            .download_asset(&url, project_id, &asset.id, self.kind)
            .await
        {
            Ok(downloaded) => asset.local_path = Some(downloaded.local_path),
            Err(e) => {
                // Best-effort asset: keep the remote URL.
                warn!(asset_id = %asset.id, "asset download failed: {e}");
            }
        }

        let asset_id = asset.id.clone();
        match self.kind {
            AssetKind::Video | AssetKind::Image => {
                let Some(scene_id) = &job.scene_id else {
                    warn!(job_id = %job.id, "completed job has no scene to attach to");
                    return Ok(());
                };
                self.projects
                    .attach_scene_asset(project_id, scene_id, asset)
                    .map_err(|e| HookError::post_processing(e.to_string()))?;
            }
            AssetKind::Audio | AssetKind::Music | AssetKind::Speech => {
                self.projects
                    .add_global_audio_track(project_id, asset)
                    .map_err(|e| HookError::post_processing(e.to_string()))?;
            }
            AssetKind::Subtitle => {}
        }

        info!(
            job_id = %job.id,
            asset_id = %asset_id,
            kind = self.kind.as_str(),
            "generation result materialized"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use tempfile::TempDir;
    use vforge_models::{AssetKind, ProjectId};
    use vforge_project::NewProject;
    use vforge_queue::{JobStatus, TaskKind};
    use vforge_storage::AssetStorageConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn services(root: &TempDir) -> (Arc<ProjectStore>, Arc<AssetStorage>) {
        let projects = Arc::new(ProjectStore::new());
        let storage = Arc::new(
            AssetStorage::new(AssetStorageConfig::new(
                root.path().join("projects"),
                root.path().join("temp"),
            ))
            .unwrap(),
        );
        (projects, storage)
    }

    fn video_job(project_id: Option<ProjectId>, scene_id: Option<vforge_models::SceneId>) -> GenerationJob {
        let mut metadata = Map::new();
        metadata.insert("cost".to_string(), json!(0.25));
        metadata.insert("model".to_string(), json!("kling_2.1"));
        metadata.insert("duration".to_string(), json!(5));
        let mut job = GenerationJob::new(
            TaskKind::Video,
            "kling_2.1",
            json!({}),
            project_id,
            scene_id,
            metadata,
        );
        job.status = JobStatus::Completed;
        job
    }

    #[tokio::test]
    async fn test_video_hook_attaches_exactly_one_asset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4".to_vec()))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let (projects, storage) = services(&root);
        let project = projects.create(NewProject {
            title: "Demo".to_string(),
            platform: "tiktok".to_string(),
            aspect_ratio: "9:16".to_string(),
            target_duration: Some(30),
            script: None,
        });
        let scene = projects.add_scene(&project.id, "intro", 5, None).unwrap();

        let hook = AssetCompletionHook::new(AssetKind::Video, projects.clone(), storage);
        let job = video_job(Some(project.id.clone()), Some(scene.id.clone()));
        let result = json!({"video": {"url": format!("{}/out.mp4", server.uri())}});

        hook.on_completed(&job, &result).await.unwrap();

        let stored = projects.get(&project.id).unwrap();
        assert_eq!(stored.scenes[0].assets.len(), 1);
        let asset = &stored.scenes[0].assets[0];
        assert_eq!(asset.kind, AssetKind::Video);
        assert_eq!(asset.cost, 0.25);
        assert!(asset.local_path.as_ref().unwrap().exists());
        assert_eq!(stored.total_cost, 0.25);
    }

    #[tokio::test]
    async fn test_hook_with_deleted_scene_attaches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4".to_vec()))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let (projects, storage) = services(&root);
        let project = projects.create(NewProject {
            title: "Demo".to_string(),
            platform: "tiktok".to_string(),
            aspect_ratio: "9:16".to_string(),
            target_duration: None,
            script: None,
        });

        let hook = AssetCompletionHook::new(AssetKind::Video, projects.clone(), storage);
        let job = video_job(
            Some(project.id.clone()),
            Some(vforge_models::SceneId::from_string("deleted")),
        );
        let result = json!({"url": format!("{}/out.mp4", server.uri())});

        let err = hook.on_completed(&job, &result).await.unwrap_err();
        assert!(matches!(err, HookError::PostProcessing(_)));
        // Zero assets appeared anywhere in the project.
        let stored = projects.get(&project.id).unwrap();
        assert!(stored.scenes.is_empty());
        assert!(stored.global_audio_tracks.is_empty());
    }

    #[tokio::test]
    async fn test_music_hook_joins_global_tracks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/track.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let (projects, storage) = services(&root);
        let project = projects.create(NewProject {
            title: "Demo".to_string(),
            platform: "tiktok".to_string(),
            aspect_ratio: "9:16".to_string(),
            target_duration: None,
            script: None,
        });

        let mut metadata = Map::new();
        metadata.insert("cost".to_string(), json!(0.4));
        let mut job = GenerationJob::new(
            TaskKind::Music,
            "lyria2",
            json!({}),
            Some(project.id.clone()),
            None,
            metadata,
        );
        job.status = JobStatus::Completed;

        let hook = AssetCompletionHook::new(AssetKind::Music, projects.clone(), storage);
        let result = json!({"audio": {"url": format!("{}/track.mp3", server.uri())}});
        hook.on_completed(&job, &result).await.unwrap();

        let stored = projects.get(&project.id).unwrap();
        assert_eq!(stored.global_audio_tracks.len(), 1);
        assert_eq!(stored.total_cost, 0.4);
    }

    #[tokio::test]
    async fn test_missing_url_is_an_error() {
        let root = TempDir::new().unwrap();
        let (projects, storage) = services(&root);
        let hook = AssetCompletionHook::new(AssetKind::Video, projects, storage);
        let job = video_job(None, None);
        let err = hook.on_completed(&job, &json!({})).await.unwrap_err();
        assert!(matches!(err, HookError::MissingArtifactUrl));
    }
}
