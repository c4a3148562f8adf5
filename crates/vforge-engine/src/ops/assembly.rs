//! Assembly operations: audio track registration, assembly, export,
//! batch downloads.

use std::path::Path;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use vforge_media::{export_for_platform, probe_video, AssemblyOptions, LogoPosition};
use vforge_models::{
    platform_spec, sanitize_title, validate_enum, validate_range, AgentError, AgentResult, Asset,
    AssetId, AssetKind, AssetSource, ProjectId, ProjectStatus, SceneId,
};
use vforge_storage::DownloadRequest;

use crate::config::is_remote_url;
use crate::error::IntoAgentError;
use crate::Engine;

#[derive(Debug, Clone, Serialize)]
pub struct AddAudioTrackResponse {
    pub asset_id: AssetId,
    pub kind: AssetKind,
    pub volume: f64,
    pub total_tracks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssembleResponse {
    pub output_path: std::path::PathBuf,
    pub duration: f64,
    pub size_mb: f64,
    pub scenes_count: usize,
    pub trimmed_seconds: f64,
    pub audio_tracks_mixed: usize,
    pub logo_added: bool,
    pub end_clip_added: bool,
    pub already_assembled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResponse {
    pub output_path: std::path::PathBuf,
    pub platform: String,
    pub duration: f64,
    pub size_mb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadAssetsResponse {
    pub downloaded: usize,
    pub failed: Vec<String>,
}

const AUDIO_TRACK_KINDS: &[&str] = &["music", "speech", "audio"];

impl Engine {
    /// Register a project-level audio track from a local file or URL.
    ///
    /// Whether the track ends up in the final video is governed by
    /// assembly's probe-based short circuit, not by filename heuristics.
    pub async fn add_audio_track(
        &self,
        project_id: &str,
        source: &str,
        kind: &str,
        track_type: Option<String>,
        volume: Option<f64>,
    ) -> AgentResult<AddAudioTrackResponse> {
        validate_enum(kind, "kind", AUDIO_TRACK_KINDS, "audio track kind")?;
        let kind = match kind {
            "music" => AssetKind::Music,
            "speech" => AssetKind::Speech,
            _ => AssetKind::Audio,
        };
        if let Some(volume) = volume {
            validate_range(volume, "volume", 0.0, 2.0, "Track volume")?;
        }

        let pid = ProjectId::from_string(project_id);
        // The project must exist before we download anything into it.
        self.projects()
            .get(&pid)
            .map_err(IntoAgentError::into_agent_error)?;

        let mut asset = if is_remote_url(source) {
            let mut asset = Asset::generated(kind, source);
            asset.source = AssetSource::Uploaded;
            let asset_id = asset.id.clone();
            match self
                .storage()
                .download_asset(source, &pid, &asset_id, kind)
                .await
            {
                Ok(downloaded) => asset.local_path = Some(downloaded.local_path),
                Err(e) => {
                    return Err(AgentError::system(format!(
                        "Failed to download audio track: {e}"
                    ))
                    .with_detail("url", source.into())
                    .with_suggestion("Check that the URL is reachable and points at an audio file"))
                }
            }
            asset
        } else {
            let path = Path::new(source);
            if !path.is_file() {
                return Err(AgentError::resource_not_found(format!(
                    "Audio file not found: {source}"
                ))
                .with_detail("parameter", "source".into())
                .with_suggestion("Provide an existing audio file path or an https:// URL")
                .with_example("add_audio_track(project_id='...', source='/tmp/voiceover.mp3', kind='speech')"));
            }
            Asset::uploaded(kind, path)
        };

        if let Some(track_type) = track_type {
            asset.metadata.insert("track_type".to_string(), json!(track_type));
        }
        if let Some(volume) = volume {
            asset.metadata.insert("volume".to_string(), json!(volume));
        }

        let asset_id = asset.id.clone();
        let volume = vforge_media::AudioTrackInput::from_asset(&asset)
            .map(|t| t.volume)
            .unwrap_or(1.0);
        self.projects()
            .add_global_audio_track(&pid, asset)
            .map_err(IntoAgentError::into_agent_error)?;
        let project = self
            .projects()
            .get(&pid)
            .map_err(IntoAgentError::into_agent_error)?;

        Ok(AddAudioTrackResponse {
            asset_id,
            kind,
            volume,
            total_tracks: project.global_audio_tracks.len(),
        })
    }

    /// Assemble the project's scenes into the final video.
    ///
    /// Sets `status = Rendering` for the duration of the run, `Completed`
    /// on success and `Failed` on error. The already-assembled short
    /// circuit returns without touching status.
    pub async fn assemble_video(
        &self,
        project_id: &str,
        scene_ids: Option<Vec<String>>,
        add_logo: bool,
        logo_position: Option<String>,
        logo_padding: Option<u32>,
        add_end_clip: bool,
    ) -> AgentResult<AssembleResponse> {
        let pid = ProjectId::from_string(project_id);
        let project = self
            .projects()
            .get(&pid)
            .map_err(IntoAgentError::into_agent_error)?;

        let logo_position = match logo_position.as_deref() {
            Some(raw) => LogoPosition::parse(raw).ok_or_else(|| {
                AgentError::validation(format!("Invalid logo position: '{raw}'"))
                    .with_detail("parameter", "logo_position".into())
                    .with_valid_options(json!(LogoPosition::names()))
                    .with_suggestion("Pick one of the four corners")
                    .with_example("logo_position='bottom_right'")
            })?,
            None => LogoPosition::default(),
        };

        let options = AssemblyOptions {
            output_format: self.settings().default_output_format.clone(),
            add_logo,
            logo_position,
            logo_padding: logo_padding.unwrap_or(10),
            add_end_clip,
        };
        let scene_ids: Option<Vec<SceneId>> = scene_ids
            .map(|ids| ids.into_iter().map(SceneId::from_string).collect());

        let project_dir = self
            .settings()
            .project_dir(&pid)
            .map_err(|e| AgentError::system(format!("Cannot create project directory: {e}")))?;

        // Short-circuit probe happens before any status transition.
        let output_path = project_dir.join(format!(
            "{}_{}.{}",
            sanitize_title(&project.title),
            project.platform,
            options.output_format
        ));
        let short_circuit = output_path.exists()
            && probe_video(&output_path)
                .await
                .map(|info| info.has_audio)
                .unwrap_or(false);

        if !short_circuit {
            self.projects()
                .update(
                    &pid,
                    vforge_project::ProjectUpdate {
                        status: Some(ProjectStatus::Rendering),
                        ..Default::default()
                    },
                )
                .map_err(IntoAgentError::into_agent_error)?;
        }

        let outcome = self
            .assembler()
            .assemble(&project, scene_ids.as_deref(), &options, &project_dir)
            .await;

        match outcome {
            Ok(output) => {
                if !output.already_assembled {
                    self.projects()
                        .update(
                            &pid,
                            vforge_project::ProjectUpdate {
                                status: Some(ProjectStatus::Completed),
                                ..Default::default()
                            },
                        )
                        .map_err(IntoAgentError::into_agent_error)?;
                }
                info!(project_id, path = %output.output_path.display(), "assembly finished");
                Ok(AssembleResponse {
                    size_mb: (output.size_bytes as f64) / (1024.0 * 1024.0),
                    output_path: output.output_path,
                    duration: output.duration,
                    scenes_count: output.scenes_count,
                    trimmed_seconds: output.trimmed_seconds,
                    audio_tracks_mixed: output.audio_tracks_mixed,
                    logo_added: output.logo_added,
                    end_clip_added: output.end_clip_added,
                    already_assembled: output.already_assembled,
                })
            }
            Err(e) => {
                warn!(project_id, "assembly failed: {e}");
                if let Err(status_err) = self.projects().update(
                    &pid,
                    vforge_project::ProjectUpdate {
                        status: Some(ProjectStatus::Failed),
                        ..Default::default()
                    },
                ) {
                    warn!(project_id, "could not record failed status: {status_err}");
                }
                Err(e.into_agent_error())
            }
        }
    }

    /// Export the assembled video for its platform (or another one).
    pub async fn export_final_video(
        &self,
        project_id: &str,
        platform: Option<String>,
    ) -> AgentResult<ExportResponse> {
        let pid = ProjectId::from_string(project_id);
        let project = self
            .projects()
            .get(&pid)
            .map_err(IntoAgentError::into_agent_error)?;
        let platform = platform.unwrap_or_else(|| project.platform.clone());
        let spec = platform_spec(&platform);

        let stem = format!("{}_{}", sanitize_title(&project.title), project.platform);
        let assembled = self.settings().assembled_path(
            &pid,
            &stem,
            &self.settings().default_output_format,
        );
        if !assembled.exists() {
            return Err(AgentError::state("Project has no assembled video yet")
                .with_detail("expected_path", assembled.display().to_string().into())
                .with_suggestion("Run assemble_video() first")
                .with_example("assemble_video(project_id='...')"));
        }

        let exports_dir = self
            .settings()
            .exports_dir(&pid)
            .map_err(|e| AgentError::system(format!("Cannot create exports directory: {e}")))?;
        let output = exports_dir.join(format!(
            "{}_{}_final.{}",
            sanitize_title(&project.title),
            spec.key,
            self.settings().default_output_format
        ));

        let info = export_for_platform(self.runner(), &assembled, &output, spec.key)
            .await
            .map_err(IntoAgentError::into_agent_error)?;

        Ok(ExportResponse {
            output_path: output,
            platform: spec.key.to_string(),
            duration: info.duration,
            size_mb: (info.size as f64) / (1024.0 * 1024.0),
        })
    }

    /// Download every remote-only asset of a project.
    pub async fn download_project_assets(
        &self,
        project_id: &str,
        max_concurrent: Option<usize>,
    ) -> AgentResult<DownloadAssetsResponse> {
        let pid = ProjectId::from_string(project_id);
        let project = self
            .projects()
            .get(&pid)
            .map_err(IntoAgentError::into_agent_error)?;

        let pending: Vec<DownloadRequest> = project
            .scenes
            .iter()
            .flat_map(|s| s.assets.iter())
            .chain(project.global_audio_tracks.iter())
            .filter(|asset| asset.local_path.is_none())
            .filter_map(|asset| {
                asset.url.as_ref().map(|url| DownloadRequest {
                    url: url.clone(),
                    asset_id: asset.id.clone(),
                    kind: asset.kind,
                })
            })
            .collect();

        if pending.is_empty() {
            return Ok(DownloadAssetsResponse {
                downloaded: 0,
                failed: Vec::new(),
            });
        }

        let results = self
            .storage()
            .download_many(pending, &pid, max_concurrent)
            .await;

        let mut downloaded = 0;
        let mut failed = Vec::new();
        for (asset_id, result) in results {
            match result {
                Ok(item) => {
                    downloaded += 1;
                    if let Err(e) =
                        self.projects()
                            .update_asset_local_path(&pid, &asset_id, item.local_path)
                    {
                        warn!(asset_id = %asset_id, "could not record local path: {e}");
                    }
                }
                Err(e) => failed.push(format!("{asset_id}: {e}")),
            }
        }

        Ok(DownloadAssetsResponse { downloaded, failed })
    }
}
